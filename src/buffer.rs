//! Bit-addressable read/write buffers.
//!
//! Both buffers keep a single sequential cursor measured in bits. Every call
//! carries the logical field name (for error reporting) and an explicit bit
//! width; nothing is inferred from the value type. Multi-byte values honor
//! the byte order fixed at construction; sub-byte reads are MSB-first within
//! each byte regardless of byte order.

use byteorder::ByteOrder as _;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("{name}: end of buffer reading {bits} bits at bit {at}")]
    EndOfBuffer { name: String, bits: u32, at: usize },
    #[error("{name}: width {bits} exceeds {max} bits")]
    WidthTooLarge { name: String, bits: u32, max: u32 },
    #[error("{name}: string access must be byte-aligned and whole bytes")]
    Misaligned { name: String },
    #[error("{name}: invalid {encoding} data")]
    Encoding { name: String, encoding: String },
}

fn check_width(name: &str, bits: u32, max: u32) -> Result<(), BufferError> {
    if bits == 0 || bits > max {
        return Err(BufferError::WidthTooLarge {
            name: name.to_string(),
            bits,
            max,
        });
    }
    Ok(())
}

pub struct ReadBuffer<'a> {
    data: &'a [u8],
    bit_pos: usize,
    order: ByteOrder,
}

impl<'a> ReadBuffer<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        ReadBuffer {
            data,
            bit_pos: 0,
            order,
        }
    }

    /// Cursor position in bits from the start of the buffer.
    pub fn position(&self) -> u64 {
        self.bit_pos as u64
    }

    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    pub fn has_more(&self, bits: usize) -> bool {
        self.remaining_bits() >= bits
    }

    fn take_bits(&mut self, name: &str, bits: u32) -> Result<u64, BufferError> {
        if self.remaining_bits() < bits as usize {
            return Err(BufferError::EndOfBuffer {
                name: name.to_string(),
                bits,
                at: self.bit_pos,
            });
        }
        // Aligned whole-byte access goes through byteorder directly.
        if self.bit_pos % 8 == 0 && bits % 8 == 0 {
            let start = self.bit_pos / 8;
            let len = bits as usize / 8;
            let slice = &self.data[start..start + len];
            self.bit_pos += bits as usize;
            return Ok(match self.order {
                ByteOrder::BigEndian => byteorder::BigEndian::read_uint(slice, len),
                ByteOrder::LittleEndian => byteorder::LittleEndian::read_uint(slice, len),
            });
        }
        // Unaligned: MSB-first bit at a time. Byte order is a whole-byte
        // notion and does not apply here.
        let mut value = 0u64;
        for _ in 0..bits {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
            value = (value << 1) | u64::from(bit);
            self.bit_pos += 1;
        }
        Ok(value)
    }

    pub fn read_bit(&mut self, name: &str) -> Result<bool, BufferError> {
        Ok(self.take_bits(name, 1)? != 0)
    }

    pub fn read_byte(&mut self, name: &str) -> Result<u8, BufferError> {
        Ok(self.take_bits(name, 8)? as u8)
    }

    pub fn read_bytes(&mut self, name: &str, count: usize) -> Result<Vec<u8>, BufferError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_byte(name)?);
        }
        Ok(out)
    }

    pub fn read_u8(&mut self, name: &str, bits: u32) -> Result<u8, BufferError> {
        check_width(name, bits, 8)?;
        Ok(self.take_bits(name, bits)? as u8)
    }

    pub fn read_u16(&mut self, name: &str, bits: u32) -> Result<u16, BufferError> {
        check_width(name, bits, 16)?;
        Ok(self.take_bits(name, bits)? as u16)
    }

    pub fn read_u32(&mut self, name: &str, bits: u32) -> Result<u32, BufferError> {
        check_width(name, bits, 32)?;
        Ok(self.take_bits(name, bits)? as u32)
    }

    pub fn read_u64(&mut self, name: &str, bits: u32) -> Result<u64, BufferError> {
        check_width(name, bits, 64)?;
        self.take_bits(name, bits)
    }

    fn sign_extend(value: u64, bits: u32) -> i64 {
        if bits == 64 {
            return value as i64;
        }
        let sign = 1u64 << (bits - 1);
        if value & sign != 0 {
            (value | !(sign | (sign - 1))) as i64
        } else {
            value as i64
        }
    }

    pub fn read_i8(&mut self, name: &str, bits: u32) -> Result<i8, BufferError> {
        check_width(name, bits, 8)?;
        Ok(Self::sign_extend(self.take_bits(name, bits)?, bits) as i8)
    }

    pub fn read_i16(&mut self, name: &str, bits: u32) -> Result<i16, BufferError> {
        check_width(name, bits, 16)?;
        Ok(Self::sign_extend(self.take_bits(name, bits)?, bits) as i16)
    }

    pub fn read_i32(&mut self, name: &str, bits: u32) -> Result<i32, BufferError> {
        check_width(name, bits, 32)?;
        Ok(Self::sign_extend(self.take_bits(name, bits)?, bits) as i32)
    }

    pub fn read_i64(&mut self, name: &str, bits: u32) -> Result<i64, BufferError> {
        check_width(name, bits, 64)?;
        Ok(Self::sign_extend(self.take_bits(name, bits)?, bits))
    }

    pub fn read_f32(&mut self, name: &str) -> Result<f32, BufferError> {
        Ok(f32::from_bits(self.take_bits(name, 32)? as u32))
    }

    pub fn read_f64(&mut self, name: &str) -> Result<f64, BufferError> {
        Ok(f64::from_bits(self.take_bits(name, 64)?))
    }

    /// Reads `bits / 8` bytes and decodes per `encoding` (UTF-8 or ASCII);
    /// trailing NUL padding is dropped.
    pub fn read_string(
        &mut self,
        name: &str,
        bits: u32,
        encoding: &str,
    ) -> Result<String, BufferError> {
        if bits % 8 != 0 || self.bit_pos % 8 != 0 {
            return Err(BufferError::Misaligned {
                name: name.to_string(),
            });
        }
        let mut bytes = self.read_bytes(name, bits as usize / 8)?;
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        if encoding.eq_ignore_ascii_case("ascii") && !bytes.is_ascii() {
            return Err(BufferError::Encoding {
                name: name.to_string(),
                encoding: encoding.to_string(),
            });
        }
        String::from_utf8(bytes).map_err(|_| BufferError::Encoding {
            name: name.to_string(),
            encoding: encoding.to_string(),
        })
    }
}

pub struct WriteBuffer {
    data: Vec<u8>,
    bit_pos: usize,
    order: ByteOrder,
}

impl WriteBuffer {
    pub fn new(order: ByteOrder) -> Self {
        WriteBuffer {
            data: Vec::new(),
            bit_pos: 0,
            order,
        }
    }

    /// Cursor position in bits from the start of the buffer.
    pub fn position(&self) -> u64 {
        self.bit_pos as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn put_bits(&mut self, value: u64, bits: u32) {
        // Aligned whole-byte access goes through byteorder directly.
        if self.bit_pos % 8 == 0 && bits % 8 == 0 {
            let len = bits as usize / 8;
            let mut buf = [0u8; 8];
            match self.order {
                ByteOrder::BigEndian => byteorder::BigEndian::write_uint(&mut buf, value, len),
                ByteOrder::LittleEndian => {
                    byteorder::LittleEndian::write_uint(&mut buf, value, len)
                }
            }
            self.data.extend_from_slice(&buf[..len]);
            self.bit_pos += bits as usize;
            return;
        }
        for i in (0..bits).rev() {
            let bit = ((value >> i) & 1) as u8;
            if self.bit_pos % 8 == 0 {
                self.data.push(0);
            }
            let byte = self.bit_pos / 8;
            self.data[byte] |= bit << (7 - self.bit_pos % 8);
            self.bit_pos += 1;
        }
    }

    fn mask(bits: u32) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    pub fn write_bit(&mut self, _name: &str, value: bool) -> Result<(), BufferError> {
        self.put_bits(u64::from(value), 1);
        Ok(())
    }

    pub fn write_byte(&mut self, _name: &str, value: u8) -> Result<(), BufferError> {
        self.put_bits(u64::from(value), 8);
        Ok(())
    }

    pub fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), BufferError> {
        for b in bytes {
            self.write_byte(name, *b)?;
        }
        Ok(())
    }

    pub fn write_u8(&mut self, name: &str, bits: u32, value: u8) -> Result<(), BufferError> {
        check_width(name, bits, 8)?;
        self.put_bits(u64::from(value) & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_u16(&mut self, name: &str, bits: u32, value: u16) -> Result<(), BufferError> {
        check_width(name, bits, 16)?;
        self.put_bits(u64::from(value) & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_u32(&mut self, name: &str, bits: u32, value: u32) -> Result<(), BufferError> {
        check_width(name, bits, 32)?;
        self.put_bits(u64::from(value) & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_u64(&mut self, name: &str, bits: u32, value: u64) -> Result<(), BufferError> {
        check_width(name, bits, 64)?;
        self.put_bits(value & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_i8(&mut self, name: &str, bits: u32, value: i8) -> Result<(), BufferError> {
        check_width(name, bits, 8)?;
        self.put_bits(value as u64 & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_i16(&mut self, name: &str, bits: u32, value: i16) -> Result<(), BufferError> {
        check_width(name, bits, 16)?;
        self.put_bits(value as u64 & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_i32(&mut self, name: &str, bits: u32, value: i32) -> Result<(), BufferError> {
        check_width(name, bits, 32)?;
        self.put_bits(value as u64 & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_i64(&mut self, name: &str, bits: u32, value: i64) -> Result<(), BufferError> {
        check_width(name, bits, 64)?;
        self.put_bits(value as u64 & Self::mask(bits), bits);
        Ok(())
    }

    pub fn write_f32(&mut self, _name: &str, value: f32) -> Result<(), BufferError> {
        self.put_bits(u64::from(value.to_bits()), 32);
        Ok(())
    }

    pub fn write_f64(&mut self, _name: &str, value: f64) -> Result<(), BufferError> {
        self.put_bits(value.to_bits(), 64);
        Ok(())
    }

    /// Writes `bits / 8` bytes, NUL-padding or truncating to the width.
    pub fn write_string(
        &mut self,
        name: &str,
        bits: u32,
        encoding: &str,
        value: &str,
    ) -> Result<(), BufferError> {
        if bits % 8 != 0 || self.bit_pos % 8 != 0 {
            return Err(BufferError::Misaligned {
                name: name.to_string(),
            });
        }
        if encoding.eq_ignore_ascii_case("ascii") && !value.is_ascii() {
            return Err(BufferError::Encoding {
                name: name.to_string(),
                encoding: encoding.to_string(),
            });
        }
        let len = bits as usize / 8;
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(len, 0);
        self.write_bytes(name, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unaligned_bits_msb_first() {
        let mut wb = WriteBuffer::new(ByteOrder::BigEndian);
        wb.write_bit("a", true).expect("write");
        wb.write_u8("b", 3, 0b101).expect("write");
        wb.write_u8("c", 4, 0xF).expect("write");
        assert_eq!(wb.bytes(), &[0b1101_1111]);

        let data = wb.into_bytes();
        let mut rb = ReadBuffer::new(&data, ByteOrder::BigEndian);
        assert!(rb.read_bit("a").expect("read"));
        assert_eq!(rb.read_u8("b", 3).expect("read"), 0b101);
        assert_eq!(rb.read_u8("c", 4).expect("read"), 0xF);
        assert_eq!(rb.position(), 8);
    }

    #[test]
    fn little_endian_swaps_whole_bytes() {
        let mut wb = WriteBuffer::new(ByteOrder::LittleEndian);
        wb.write_u16("v", 16, 0x1234).expect("write");
        assert_eq!(wb.bytes(), &[0x34, 0x12]);

        let data = wb.into_bytes();
        let mut rb = ReadBuffer::new(&data, ByteOrder::LittleEndian);
        assert_eq!(rb.read_u16("v", 16).expect("read"), 0x1234);
    }

    #[test]
    fn signed_values_sign_extend() {
        let mut wb = WriteBuffer::new(ByteOrder::BigEndian);
        wb.write_i16("v", 16, -1).expect("write");
        wb.write_i8("w", 4, -3).expect("write");
        let data = wb.into_bytes();
        let mut rb = ReadBuffer::new(&data, ByteOrder::BigEndian);
        assert_eq!(rb.read_i16("v", 16).expect("read"), -1);
        assert_eq!(rb.read_i8("w", 4).expect("read"), -3);
    }

    #[test]
    fn over_width_rejected() {
        let data = [0u8; 16];
        let mut rb = ReadBuffer::new(&data, ByteOrder::BigEndian);
        assert!(matches!(
            rb.read_u8("v", 9),
            Err(BufferError::WidthTooLarge { .. })
        ));
        assert!(matches!(
            rb.read_u64("v", 65),
            Err(BufferError::WidthTooLarge { .. })
        ));
    }

    #[test]
    fn end_of_buffer_reported() {
        let data = [0xFFu8];
        let mut rb = ReadBuffer::new(&data, ByteOrder::BigEndian);
        rb.read_u8("a", 8).expect("read");
        assert!(matches!(
            rb.read_u8("b", 1),
            Err(BufferError::EndOfBuffer { .. })
        ));
    }

    #[test]
    fn string_round_trip_with_padding() {
        let mut wb = WriteBuffer::new(ByteOrder::BigEndian);
        wb.write_string("s", 64, "UTF-8", "hello").expect("write");
        let data = wb.into_bytes();
        assert_eq!(data.len(), 8);
        let mut rb = ReadBuffer::new(&data, ByteOrder::BigEndian);
        assert_eq!(rb.read_string("s", 64, "UTF-8").expect("read"), "hello");
    }
}
