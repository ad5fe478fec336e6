// Streaming delta encoder.
//
// DeltaEncoder provides a streaming API for delta generation:
//   - The basis is known only through its SignatureIndex
//   - Target data is fed in chunks via write_target()
//   - A block_len window slides over the target one byte at a time
//   - Commands are written as soon as they are final
//
// Memory: one window of block_len bytes plus the literal accumulator,
// which is flushed whenever it reaches EncodeOptions::max_literal.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::hash::RollingChecksum;
use crate::signature::{Probe, SignatureIndex};

use super::command;
use super::window::Window;

// ---------------------------------------------------------------------------
// Options and statistics
// ---------------------------------------------------------------------------

/// Configuration for the delta encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Largest LITERAL command the encoder emits.  Longer unmatched runs
    /// are split into consecutive literals.
    pub max_literal: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_literal: 1 << 20, // 1 MiB
        }
    }
}

impl EncodeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_literal == 0 {
            return Err(Error::invalid_config("max literal length must be non-zero"));
        }
        Ok(())
    }
}

/// Counters for one delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaStats {
    /// Target bytes consumed.
    pub target_len: u64,
    pub copy_cmds: u64,
    pub copy_bytes: u64,
    pub literal_cmds: u64,
    pub literal_bytes: u64,
    /// Windows whose weak checksum matched but strong sum did not.
    pub false_matches: u64,
    /// Delta bytes written, magic and END included.
    pub delta_len: u64,
}

// ---------------------------------------------------------------------------
// DeltaEncoder
// ---------------------------------------------------------------------------

/// Streaming delta encoder over a signature index.
///
/// # Example
/// ```
/// use oxisync::delta::DeltaEncoder;
/// use oxisync::signature::{SignatureOptions, signature_of};
///
/// let sig = signature_of(b"hello world", SignatureOptions::default()).unwrap();
/// let index = sig.build_index();
/// let mut enc = DeltaEncoder::new(Vec::new(), &index).unwrap();
/// enc.write_target(b"hello world").unwrap();
/// let (delta, stats) = enc.finish().unwrap();
/// assert_eq!(stats.copy_bytes, 11);
/// assert!(!delta.is_empty());
/// ```
pub struct DeltaEncoder<'i, W: Write> {
    output: W,
    index: &'i SignatureIndex,
    opts: EncodeOptions,

    window: Window,
    sum: RollingChecksum,
    /// Contiguous copy of the window, filled only for strong-hash checks.
    scratch: Vec<u8>,

    literal: Vec<u8>,
    /// COPY waiting for a contiguous successor: (offset, len).
    pending_copy: Option<(u64, u64)>,

    stats: DeltaStats,
}

impl<'i, W: Write> DeltaEncoder<'i, W> {
    /// Create an encoder with default options and write the delta magic.
    pub fn new(writer: W, index: &'i SignatureIndex) -> Result<Self> {
        Self::with_options(writer, index, EncodeOptions::default())
    }

    pub fn with_options(
        mut writer: W,
        index: &'i SignatureIndex,
        opts: EncodeOptions,
    ) -> Result<Self> {
        opts.validate()?;
        let magic_len = command::write_magic(&mut writer)?;
        Ok(Self {
            output: writer,
            index,
            opts,
            window: Window::with_capacity(index.block_len() as usize),
            sum: RollingChecksum::new(),
            scratch: Vec::new(),
            literal: Vec::new(),
            pending_copy: None,
            stats: DeltaStats {
                delta_len: magic_len as u64,
                ..DeltaStats::default()
            },
        })
    }

    /// Feed target data.  Commands are written as they are decided.
    pub fn write_target(&mut self, data: &[u8]) -> Result<()> {
        self.stats.target_len += data.len() as u64;

        // Nothing can match an empty basis.
        if self.index.is_empty() {
            return self.push_literal_slice(data);
        }

        for &byte in data {
            self.push_byte(byte)?;
        }
        Ok(())
    }

    /// Feed everything `reader` yields until end of stream.  Returns the
    /// number of target bytes read.
    pub fn write_target_from<R: Read>(&mut self, mut reader: R) -> Result<u64> {
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.write_target(&buf[..n])?;
            total += n as u64;
        }
    }

    /// Resolve the tail of the target, write END and return the writer
    /// together with the delta statistics.
    pub fn finish(mut self) -> Result<(W, DeltaStats)> {
        // A full window was already probed when its last byte arrived.
        if self.window.is_full() {
            self.drop_front()?;
        }

        // Shrink the window from the front so the basis' short last block
        // can still match.
        while !self.window.is_empty() {
            if self.try_match()? {
                break;
            }
            self.drop_front()?;
        }

        self.flush_copy()?;
        self.flush_literal()?;
        self.stats.delta_len += command::write_end(&mut self.output)? as u64;
        self.output.flush()?;

        let s = &self.stats;
        log::debug!(
            "delta: target {} bytes, {} copies ({} bytes), {} literals ({} bytes), \
             {} false matches, delta {} bytes",
            s.target_len,
            s.copy_cmds,
            s.copy_bytes,
            s.literal_cmds,
            s.literal_bytes,
            s.false_matches,
            s.delta_len
        );
        Ok((self.output, self.stats))
    }

    /// Statistics so far (pending commands not yet counted).
    pub fn stats(&self) -> &DeltaStats {
        &self.stats
    }

    // -- window ------------------------------------------------------------

    fn push_byte(&mut self, byte: u8) -> Result<()> {
        match self.window.push_back(byte) {
            Some(out) => {
                self.sum.rotate(out, byte);
                self.push_literal(out)?;
            }
            None => self.sum.roll_in(byte),
        }

        if self.window.is_full() {
            self.try_match()?;
        }
        Ok(())
    }

    /// Move the oldest window byte into the literal accumulator.
    fn drop_front(&mut self) -> Result<()> {
        if let Some(out) = self.window.pop_front() {
            self.sum.roll_out(out);
            self.push_literal(out)?;
        }
        Ok(())
    }

    /// Probe the index with the current window.  On a hit the window is
    /// turned into a COPY and cleared.
    fn try_match(&mut self) -> Result<bool> {
        let weak = self.sum.value();
        if self.index.lookup(weak).is_empty() {
            return Ok(false);
        }
        self.window.copy_into(&mut self.scratch);
        match self.index.probe(weak, &self.scratch) {
            Probe::Miss => Ok(false),
            Probe::WeakOnly => {
                self.stats.false_matches += 1;
                log::trace!("false match on weak {weak:#010x}");
                Ok(false)
            }
            Probe::Hit(block) => {
                let len = self.window.len() as u64;
                self.flush_literal()?;
                self.queue_copy(self.index.block_offset(block), len)?;
                self.window.clear();
                self.sum.reset();
                Ok(true)
            }
        }
    }

    // -- commands ----------------------------------------------------------

    fn queue_copy(&mut self, offset: u64, len: u64) -> Result<()> {
        if let Some((prev_off, prev_len)) = self.pending_copy.as_mut()
            && *prev_off + *prev_len == offset
        {
            *prev_len += len;
            return Ok(());
        }
        self.flush_copy()?;
        self.pending_copy = Some((offset, len));
        Ok(())
    }

    fn flush_copy(&mut self) -> io::Result<()> {
        if let Some((offset, len)) = self.pending_copy.take() {
            log::trace!("COPY offset={offset} len={len}");
            self.stats.delta_len += command::write_copy(&mut self.output, offset, len)? as u64;
            self.stats.copy_cmds += 1;
            self.stats.copy_bytes += len;
        }
        Ok(())
    }

    fn push_literal(&mut self, byte: u8) -> Result<()> {
        self.flush_copy()?;
        self.literal.push(byte);
        if self.literal.len() >= self.opts.max_literal {
            self.flush_literal()?;
        }
        Ok(())
    }

    fn push_literal_slice(&mut self, mut data: &[u8]) -> Result<()> {
        self.flush_copy()?;
        while !data.is_empty() {
            let room = self.opts.max_literal - self.literal.len();
            let take = room.min(data.len());
            self.literal.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.literal.len() >= self.opts.max_literal {
                self.flush_literal()?;
            }
        }
        Ok(())
    }

    fn flush_literal(&mut self) -> io::Result<()> {
        if self.literal.is_empty() {
            return Ok(());
        }
        log::trace!("LITERAL len={}", self.literal.len());
        self.stats.delta_len += command::write_literal(&mut self.output, &self.literal)? as u64;
        self.stats.literal_cmds += 1;
        self.stats.literal_bytes += self.literal.len() as u64;
        self.literal.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Read buffer used by [`DeltaEncoder::write_target_from`].
const READ_BUF_SIZE: usize = 64 * 1024;

/// Encode `target` against `index`, writing the delta to `output`.
pub fn encode_delta<R: Read, W: Write>(
    index: &SignatureIndex,
    target: R,
    output: W,
) -> Result<DeltaStats> {
    encode_delta_with_options(index, target, output, EncodeOptions::default())
}

pub fn encode_delta_with_options<R: Read, W: Write>(
    index: &SignatureIndex,
    target: R,
    output: W,
    opts: EncodeOptions,
) -> Result<DeltaStats> {
    let mut enc = DeltaEncoder::with_options(output, index, opts)?;
    enc.write_target_from(target)?;
    let (_, stats) = enc.finish()?;
    Ok(stats)
}

/// Encode an in-memory target into a fresh buffer.
pub fn delta_all(index: &SignatureIndex, target: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_delta(index, target, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
