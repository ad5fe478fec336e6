// Delta command encoding (librsync "prototab" subset).
//
// After the 4-byte magic, a delta is a sequence of commands:
//
//   0x00          END
//   0x01..=0x40   LITERAL, length = opcode, payload follows
//   0x41..=0x44   LITERAL, length in 1/2/4/8 bytes, payload follows
//   0x45..=0x54   COPY, opcode = 0x45 + 4 * w(offset) + w(len)
//
// Integer parameters are big-endian and always use the narrowest of the
// four widths that fits.  Every other opcode is reserved.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Magic number at the start of every delta (librsync `RS_DELTA_MAGIC`).
pub const DELTA_MAGIC: u32 = 0x7273_0236;

pub const OP_END: u8 = 0x00;
/// Longest literal whose length is carried in the opcode itself.
pub const MAX_IMMEDIATE_LITERAL: usize = 0x40;
pub const OP_LITERAL_N1: u8 = 0x41;
pub const OP_LITERAL_N8: u8 = 0x44;
pub const OP_COPY_BASE: u8 = 0x45;
pub const OP_COPY_LAST: u8 = 0x54;

/// Byte widths addressable by a 2-bit width code.
const WIDTHS: [usize; 4] = [1, 2, 4, 8];

// ---------------------------------------------------------------------------
// Integer widths
// ---------------------------------------------------------------------------

/// Width code (0..=3) of the narrowest encoding of `v`.
#[inline]
pub fn width_code(v: u64) -> u8 {
    if v <= u64::from(u8::MAX) {
        0
    } else if v <= u64::from(u16::MAX) {
        1
    } else if v <= u64::from(u32::MAX) {
        2
    } else {
        3
    }
}

/// Byte width for a width code.
#[inline]
pub fn width_bytes(code: u8) -> usize {
    WIDTHS[usize::from(code & 3)]
}

/// Write the low `width` bytes of `v`, big-endian.
#[inline]
fn write_uint<W: Write + ?Sized>(w: &mut W, v: u64, width: usize) -> io::Result<()> {
    w.write_all(&v.to_be_bytes()[8 - width..])
}

/// Read a `width`-byte big-endian integer.
pub fn read_uint<R: Read + ?Sized>(r: &mut R, width: usize) -> io::Result<u64> {
    debug_assert!(WIDTHS.contains(&width));
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf[8 - width..])?;
    Ok(u64::from_be_bytes(buf))
}

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Decoded meaning of one command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    End,
    /// Literal with the length carried in the opcode.
    ImmediateLiteral(u8),
    /// Literal with a length parameter of the given byte width.
    Literal { len_width: usize },
    /// Copy with offset and length parameters of the given byte widths.
    Copy {
        offset_width: usize,
        len_width: usize,
    },
}

impl Opcode {
    /// Classify a command byte; reserved bytes are `CorruptDelta`.
    pub fn parse(op: u8) -> Result<Self> {
        match op {
            OP_END => Ok(Self::End),
            0x01..=0x40 => Ok(Self::ImmediateLiteral(op)),
            OP_LITERAL_N1..=OP_LITERAL_N8 => Ok(Self::Literal {
                len_width: width_bytes(op - OP_LITERAL_N1),
            }),
            OP_COPY_BASE..=OP_COPY_LAST => {
                let code = op - OP_COPY_BASE;
                Ok(Self::Copy {
                    offset_width: width_bytes(code >> 2),
                    len_width: width_bytes(code),
                })
            }
            other => Err(Error::corrupt_delta(format!(
                "reserved command byte {other:#04x}"
            ))),
        }
    }

    /// Bytes of integer parameters following the opcode.
    pub fn param_len(self) -> usize {
        match self {
            Self::End | Self::ImmediateLiteral(_) => 0,
            Self::Literal { len_width } => len_width,
            Self::Copy {
                offset_width,
                len_width,
            } => offset_width + len_width,
        }
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------
//
// Each writer returns the number of bytes it emitted.

pub fn write_magic<W: Write + ?Sized>(w: &mut W) -> io::Result<usize> {
    w.write_all(&DELTA_MAGIC.to_be_bytes())?;
    Ok(4)
}

/// Write a LITERAL command header for `len` payload bytes.
pub fn write_literal_header<W: Write + ?Sized>(w: &mut W, len: u64) -> io::Result<usize> {
    if (1..=MAX_IMMEDIATE_LITERAL as u64).contains(&len) {
        w.write_all(&[len as u8])?;
        return Ok(1);
    }
    let code = width_code(len);
    let width = width_bytes(code);
    w.write_all(&[OP_LITERAL_N1 + code])?;
    write_uint(w, len, width)?;
    Ok(1 + width)
}

/// Write a complete LITERAL command.
pub fn write_literal<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> io::Result<usize> {
    let hdr = write_literal_header(w, data.len() as u64)?;
    w.write_all(data)?;
    Ok(hdr + data.len())
}

/// Write a COPY command.
pub fn write_copy<W: Write + ?Sized>(w: &mut W, offset: u64, len: u64) -> io::Result<usize> {
    let off_code = width_code(offset);
    let len_code = width_code(len);
    let off_width = width_bytes(off_code);
    let len_width = width_bytes(len_code);
    w.write_all(&[OP_COPY_BASE + (off_code << 2) + len_code])?;
    write_uint(w, offset, off_width)?;
    write_uint(w, len, len_width)?;
    Ok(1 + off_width + len_width)
}

pub fn write_end<W: Write + ?Sized>(w: &mut W) -> io::Result<usize> {
    w.write_all(&[OP_END])?;
    Ok(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowest_width() {
        assert_eq!(width_code(0), 0);
        assert_eq!(width_code(255), 0);
        assert_eq!(width_code(256), 1);
        assert_eq!(width_code(65_535), 1);
        assert_eq!(width_code(65_536), 2);
        assert_eq!(width_code(u64::from(u32::MAX)), 2);
        assert_eq!(width_code(u64::from(u32::MAX) + 1), 3);
        assert_eq!(width_code(u64::MAX), 3);
    }

    #[test]
    fn uint_big_endian() {
        let mut out = Vec::new();
        write_uint(&mut out, 0x0102_0304, 4).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(read_uint(&mut out.as_slice(), 4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn immediate_literal_header() {
        let mut out = Vec::new();
        assert_eq!(write_literal(&mut out, b"abc").unwrap(), 4);
        assert_eq!(out, [0x03, b'a', b'b', b'c']);

        out.clear();
        write_literal_header(&mut out, 64).unwrap();
        assert_eq!(out, [0x40]);
    }

    #[test]
    fn sized_literal_header() {
        let mut out = Vec::new();
        assert_eq!(write_literal_header(&mut out, 65).unwrap(), 2);
        assert_eq!(out, [0x41, 65]);

        out.clear();
        write_literal_header(&mut out, 1000).unwrap();
        assert_eq!(out, [0x42, 0x03, 0xE8]);

        out.clear();
        write_literal_header(&mut out, 0).unwrap();
        assert_eq!(out, [0x41, 0]);
    }

    #[test]
    fn copy_opcode_combines_widths() {
        let mut out = Vec::new();
        assert_eq!(write_copy(&mut out, 0, 512).unwrap(), 4);
        assert_eq!(out, [0x46, 0x00, 0x02, 0x00]);

        out.clear();
        write_copy(&mut out, 1 << 40, 1).unwrap();
        assert_eq!(out[0], OP_COPY_BASE + 12);
        assert_eq!(out.len(), 1 + 8 + 1);
    }

    #[test]
    fn every_copy_opcode_parses() {
        for op in OP_COPY_BASE..=OP_COPY_LAST {
            let code = op - OP_COPY_BASE;
            assert_eq!(
                Opcode::parse(op).unwrap(),
                Opcode::Copy {
                    offset_width: WIDTHS[usize::from(code / 4)],
                    len_width: WIDTHS[usize::from(code % 4)],
                }
            );
        }
    }

    #[test]
    fn literal_opcodes_parse() {
        assert_eq!(Opcode::parse(0x01).unwrap(), Opcode::ImmediateLiteral(1));
        assert_eq!(Opcode::parse(0x40).unwrap(), Opcode::ImmediateLiteral(64));
        assert_eq!(
            Opcode::parse(0x44).unwrap(),
            Opcode::Literal { len_width: 8 }
        );
        assert_eq!(Opcode::parse(0x00).unwrap(), Opcode::End);
    }

    #[test]
    fn reserved_opcodes_are_corrupt() {
        for op in (OP_COPY_LAST + 1)..=u8::MAX {
            assert!(matches!(Opcode::parse(op), Err(Error::CorruptDelta(_))));
        }
    }
}
