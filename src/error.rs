//! Compile-time error taxonomy.
//!
//! Every error aborts compilation of the current unit; nothing is downgraded
//! to a silent default, since interdependent half-generated codecs are worse
//! than none.

/// Errors raised while compiling a specification unit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed spec text: bad block structure, unknown base-type token.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Unresolved reference, duplicate discriminator value, or a
    /// virtual-field cycle that never bottoms out in a concrete field.
    #[error("resolution error: {0}")]
    Resolution(String),
    /// Wrong call arity or an unsupported operator/base-type combination.
    #[error("expression error: {0}")]
    Expression(String),
    /// A target was asked to map a width tier it cannot represent.
    #[error("emission error: {0}")]
    Emission(String),
}
