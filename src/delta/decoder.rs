// Delta stream parser.
//
// DeltaReader turns a delta byte stream into a lazy sequence of
// instructions.  It never looks at the basis; validating COPY ranges is
// the patcher's job.

use std::io::{self, Read};

use crate::error::{Error, Result};

use super::command::{self, DELTA_MAGIC, Opcode};

/// One decoded delta command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `len` bytes starting at absolute basis offset `offset`.
    Copy { offset: u64, len: u64 },
    /// Emit these bytes verbatim.
    Literal(Vec<u8>),
    /// End of delta.
    End,
}

impl Instruction {
    /// Bytes this instruction contributes to the output.
    pub fn output_len(&self) -> u64 {
        match self {
            Self::Copy { len, .. } => *len,
            Self::Literal(data) => data.len() as u64,
            Self::End => 0,
        }
    }
}

/// Forward-only iterator over the instructions of a delta.
///
/// Yields `End` exactly once and then `None`.  After an error the reader
/// is exhausted.
pub struct DeltaReader<R: Read> {
    reader: R,
    done: bool,
    /// Delta bytes consumed so far, magic included.
    consumed: u64,
}

impl<R: Read> DeltaReader<R> {
    /// Read and check the delta magic.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| eof_is_corrupt(e, "truncated delta magic"))?;
        let magic = u32::from_be_bytes(magic);
        if magic != DELTA_MAGIC {
            return Err(Error::corrupt_delta(format!(
                "bad delta magic {magic:#010x}"
            )));
        }
        Ok(Self {
            reader,
            done: false,
            consumed: 4,
        })
    }

    /// Delta bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Whether `End` (or an error) has been returned.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Give back the underlying reader, positioned after the last command
    /// read.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_instruction(&mut self) -> Result<Instruction> {
        let mut op = [0u8; 1];
        self.reader
            .read_exact(&mut op)
            .map_err(|e| eof_is_corrupt(e, "delta ends without END command"))?;
        self.consumed += 1;

        let opcode = Opcode::parse(op[0])?;
        let insn = match opcode {
            Opcode::End => Instruction::End,
            Opcode::ImmediateLiteral(len) => {
                Instruction::Literal(self.read_payload(u64::from(len))?)
            }
            Opcode::Literal { len_width } => {
                let len = self.read_param(len_width)?;
                Instruction::Literal(self.read_payload(len)?)
            }
            Opcode::Copy {
                offset_width,
                len_width,
            } => {
                let offset = self.read_param(offset_width)?;
                let len = self.read_param(len_width)?;
                Instruction::Copy { offset, len }
            }
        };
        log::trace!("delta command {:#04x}: {insn:?}", op[0]);
        Ok(insn)
    }

    fn read_param(&mut self, width: usize) -> Result<u64> {
        let v = command::read_uint(&mut self.reader, width)
            .map_err(|e| eof_is_corrupt(e, "truncated command parameter"))?;
        self.consumed += width as u64;
        Ok(v)
    }

    fn read_payload(&mut self, len: u64) -> Result<Vec<u8>> {
        // Grow with the data actually present rather than trusting `len`.
        let mut data = Vec::with_capacity(len.min(64 * 1024) as usize);
        (&mut self.reader).take(len).read_to_end(&mut data)?;
        if data.len() as u64 != len {
            return Err(Error::corrupt_delta(format!(
                "truncated literal: {} of {len} bytes",
                data.len()
            )));
        }
        self.consumed += len;
        Ok(data)
    }
}

impl<R: Read> Iterator for DeltaReader<R> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_instruction();
        if matches!(item, Ok(Instruction::End) | Err(_)) {
            self.done = true;
        }
        Some(item)
    }
}

impl<R: Read> std::iter::FusedIterator for DeltaReader<R> {}

fn eof_is_corrupt(e: io::Error, what: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::corrupt_delta(what)
    } else {
        Error::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
