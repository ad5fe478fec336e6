// Delta application.
//
// Replays the instructions of a delta against a seekable basis.  Every
// COPY is checked against the basis length before any byte is copied.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::delta::{DeltaReader, Instruction};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Basis access
// ---------------------------------------------------------------------------

/// Random-access basis data.
pub trait BasisSource {
    /// Total basis length in bytes.
    fn basis_len(&mut self) -> io::Result<u64>;

    /// Copy `len` bytes starting at `offset` into `out`.  Returns the
    /// number of bytes actually copied, which is short only at end of
    /// stream.
    fn copy_to(&mut self, offset: u64, len: u64, out: &mut dyn Write) -> io::Result<u64>;
}

impl<T: Read + Seek> BasisSource for T {
    fn basis_len(&mut self) -> io::Result<u64> {
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(0))?;
        Ok(len)
    }

    fn copy_to(&mut self, offset: u64, len: u64, out: &mut dyn Write) -> io::Result<u64> {
        self.seek(SeekFrom::Start(offset))?;
        io::copy(&mut self.by_ref().take(len), out)
    }
}

// ---------------------------------------------------------------------------
// Patching
// ---------------------------------------------------------------------------

/// Counters for one patch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    pub literal_cmds: u64,
    pub literal_bytes: u64,
    /// Bytes written to the output.
    pub output_len: u64,
}

/// Rebuild the target from `basis` and `delta`, writing it to `output`.
///
/// Fails with `CorruptDelta` on a malformed delta or a COPY reaching past
/// the end of the basis.  Output already written is not rolled back.
pub fn apply_delta<B, D, W>(mut basis: B, delta: D, mut output: W) -> Result<PatchStats>
where
    B: BasisSource,
    D: Read,
    W: Write,
{
    let basis_len = basis.basis_len()?;
    let mut reader = DeltaReader::new(delta)?;
    let mut stats = PatchStats::default();

    loop {
        let Some(insn) = reader.next() else {
            // The reader only stops before End after yielding an error.
            return Err(Error::corrupt_delta("delta ends without END command"));
        };
        match insn? {
            Instruction::Literal(data) => {
                output.write_all(&data)?;
                stats.literal_cmds += 1;
                stats.literal_bytes += data.len() as u64;
            }
            Instruction::Copy { offset, len } => {
                let end = offset.checked_add(len).ok_or_else(|| {
                    Error::corrupt_delta(format!("copy offset={offset} len={len} overflows"))
                })?;
                if end > basis_len {
                    return Err(Error::corrupt_delta(format!(
                        "copy [{offset}, {end}) outside basis of {basis_len} bytes"
                    )));
                }
                let copied = basis.copy_to(offset, len, &mut output)?;
                if copied != len {
                    return Err(Error::corrupt_delta(format!(
                        "basis ended after {copied} of {len} bytes at offset {offset}"
                    )));
                }
                stats.copy_cmds += 1;
                stats.copy_bytes += len;
            }
            Instruction::End => break,
        }
    }

    output.flush()?;
    stats.output_len = stats.copy_bytes + stats.literal_bytes;
    warn_on_trailing(reader.into_inner());
    log::debug!(
        "patch: {} copies ({} bytes), {} literals ({} bytes), output {} bytes",
        stats.copy_cmds,
        stats.copy_bytes,
        stats.literal_cmds,
        stats.literal_bytes,
        stats.output_len
    );
    Ok(stats)
}

fn warn_on_trailing<R: Read>(mut rest: R) {
    let mut probe = [0u8; 1];
    if let Ok(n @ 1..) = rest.read(&mut probe) {
        log::warn!("ignoring {n}+ trailing bytes after END command");
    }
}

/// Patch an in-memory basis with an in-memory delta.
pub fn patch_all(basis: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    apply_delta(io::Cursor::new(basis), delta, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
