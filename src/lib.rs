//! # binspec: binary message-format spec compiler
//!
//! Compiles a declarative binary-message-format specification into a resolved
//! typed model, and from there into parse/serialize source code per target
//! language or directly into decoded values through a model interpreter.
//!
//! ## Spec structure
//!
//! A spec unit is a sequence of square-bracket type blocks:
//!
//! ```text
//! [type Frame
//!     [const         uint 8  magicByte 0x42]
//!     [discriminator uint 8  messageType]
//!     [typeSwitch messageType
//!         ['1' FrameA
//!             [simple int 16 payload]]
//!         ['2' FrameB
//!             [simple uint 16 payload]]]]
//!
//! [enum uint 8 Color
//!     ['1' RED]
//!     ['2' GREEN]]
//! ```
//!
//! ## Field kinds
//!
//! - `simple`, `array` (count/length/terminated loops), `const`, `reserved`
//! - `optional` (condition expression), `discriminator` + `typeSwitch`
//! - `virtual` (computed at parse, never on the wire), `implicit` (on the
//!   wire, recomputed at serialize), `manual` (expressions both ways)
//! - base types: `bit`, `byte`, `uint N`, `int N`, `float N`, `string N`,
//!   `vstring 'expr'`, `time`, `date`, `dateTime`
//!
//! ## Pipeline
//!
//! [`parse`](parser::parse) each unit, [`resolve`](resolver::resolve) them
//! together, then either emit code through an [`emit::Target`] or decode and
//! encode bytes directly with [`codec::Codec`].

pub mod ast;
pub mod buffer;
pub mod codec;
pub mod emit;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod term;
pub mod value;

pub use ast::{ComplexType, EnumType, Field, TypeDefinition, TypeReference};
pub use buffer::{BufferError, ByteOrder, ReadBuffer, WriteBuffer};
pub use codec::{Codec, CodecError};
pub use emit::{JavaTarget, Target};
pub use error::Error;
pub use parser::parse;
pub use resolver::{resolve, TypeRegistry};
pub use term::{Direction, Term};
pub use value::Value;

/// Parse every unit, then resolve them together. The first error of any unit
/// aborts the compilation; no partial registry is returned.
pub fn compile(units: &[&str]) -> Result<TypeRegistry, Error> {
    let mut contexts = Vec::with_capacity(units.len());
    for unit in units {
        contexts.push(parser::parse(unit)?);
    }
    resolver::resolve(contexts)
}
