// Signature wire format (librsync compatible, all integers big-endian).
//
//   magic      u32   MD4_SIG_MAGIC | BLAKE2_SIG_MAGIC
//   block_len  u32
//   strong_len u32
//   repeated until end of stream:
//     weak     u32
//     strong   [u8; strong_len]

use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::hash::HashFamily;

use super::index::SignatureIndex;

/// Encoded header size: magic + block_len + strong_len.
pub const HEADER_LEN: usize = 12;

/// Default basis block length (librsync `RS_DEFAULT_BLOCK_LEN`).
pub const DEFAULT_BLOCK_LEN: u32 = 2048;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Parameters of a signature: hash family, block length and strong length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    /// Strong hash family (selects the magic number).
    pub family: HashFamily,
    /// Basis block length in bytes.
    pub block_len: u32,
    /// Bytes kept from each strong digest.
    pub strong_len: u32,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            family: HashFamily::Blake2,
            block_len: DEFAULT_BLOCK_LEN,
            strong_len: HashFamily::Blake2.digest_len() as u32,
        }
    }
}

impl SignatureOptions {
    /// Build and validate a parameter set.
    pub fn new(family: HashFamily, block_len: u32, strong_len: u32) -> Result<Self> {
        let opts = Self {
            family,
            block_len,
            strong_len,
        };
        opts.validate()?;
        Ok(opts)
    }

    /// Parameters with the full (untruncated) digest of `family`.
    pub fn with_family(family: HashFamily) -> Self {
        Self {
            family,
            block_len: DEFAULT_BLOCK_LEN,
            strong_len: family.digest_len() as u32,
        }
    }

    /// Reject a zero block length and strong lengths outside
    /// `1..=digest_len`.
    pub fn validate(&self) -> Result<()> {
        if self.block_len == 0 {
            return Err(Error::invalid_config("block length must be non-zero"));
        }
        let max = self.family.digest_len();
        if self.strong_len == 0 || self.strong_len as usize > max {
            return Err(Error::invalid_config(format!(
                "strong length {} out of range 1..={max} for {}",
                self.strong_len, self.family
            )));
        }
        Ok(())
    }

    fn header_bytes(&self) -> [u8; HEADER_LEN] {
        let mut hdr = [0u8; HEADER_LEN];
        hdr[0..4].copy_from_slice(&self.family.magic().to_be_bytes());
        hdr[4..8].copy_from_slice(&self.block_len.to_be_bytes());
        hdr[8..12].copy_from_slice(&self.strong_len.to_be_bytes());
        hdr
    }

    pub(crate) fn write_header<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.header_bytes())
    }

    fn read_header<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut hdr = [0u8; HEADER_LEN];
        let n = read_full(r, &mut hdr)?;
        if n < HEADER_LEN {
            return Err(Error::corrupt_signature(format!(
                "truncated header ({n} of {HEADER_LEN} bytes)"
            )));
        }
        let magic = be_u32(&hdr[0..4]);
        let family = HashFamily::from_magic(magic)?;
        Self::new(family, be_u32(&hdr[4..8]), be_u32(&hdr[8..12]))
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Weak and strong hash of one basis block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockHash {
    pub weak: u32,
    pub strong: Vec<u8>,
}

impl BlockHash {
    pub(crate) fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.weak.to_be_bytes())?;
        w.write_all(&self.strong)
    }
}

/// Block-level signature of a basis stream.
///
/// `blocks[i]` describes basis bytes `[i * block_len, (i + 1) * block_len)`,
/// the last block possibly shorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    options: SignatureOptions,
    blocks: Vec<BlockHash>,
}

impl Signature {
    /// An empty signature (zero-length basis).
    pub fn new(options: SignatureOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            blocks: Vec::new(),
        })
    }

    pub(crate) fn push(&mut self, block: BlockHash) {
        debug_assert_eq!(block.strong.len(), self.options.strong_len as usize);
        self.blocks.push(block);
    }

    pub fn options(&self) -> SignatureOptions {
        self.options
    }

    pub fn family(&self) -> HashFamily {
        self.options.family
    }

    pub fn block_len(&self) -> u32 {
        self.options.block_len
    }

    pub fn strong_len(&self) -> u32 {
        self.options.strong_len
    }

    /// Blocks in basis order.
    pub fn blocks(&self) -> &[BlockHash] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Size of the serialized signature in bytes.
    pub fn encoded_len(&self) -> u64 {
        HEADER_LEN as u64 + self.blocks.len() as u64 * (4 + u64::from(self.options.strong_len))
    }

    /// Build the weak-checksum lookup table used by the delta encoder.
    pub fn build_index(&self) -> SignatureIndex {
        SignatureIndex::new(self)
    }

    /// Serialize the signature.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        self.options.write_header(&mut w)?;
        for block in &self.blocks {
            block.write_to(&mut w)?;
        }
        Ok(())
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        out.extend_from_slice(&self.options.header_bytes());
        for block in &self.blocks {
            out.extend_from_slice(&block.weak.to_be_bytes());
            out.extend_from_slice(&block.strong);
        }
        out
    }

    /// Parse a signature, reading `r` to end of stream.
    ///
    /// An unknown magic or illegal parameters fail with `InvalidConfig`;
    /// a header or block record cut short fails with `CorruptSignature`.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let options = SignatureOptions::read_header(&mut r)?;
        let strong_len = options.strong_len as usize;
        let mut sig = Self::new(options)?;

        let mut record = vec![0u8; 4 + strong_len];
        loop {
            let n = read_full(&mut r, &mut record)?;
            if n == 0 {
                break;
            }
            if n < record.len() {
                return Err(Error::corrupt_signature(format!(
                    "truncated block {} ({n} of {} bytes)",
                    sig.blocks.len(),
                    record.len()
                )));
            }
            sig.blocks.push(BlockHash {
                weak: be_u32(&record[0..4]),
                strong: record[4..].to_vec(),
            });
        }

        log::debug!(
            "read signature: {} blocks, family={}, block_len={}, strong_len={}",
            sig.blocks.len(),
            options.family,
            options.block_len,
            options.strong_len
        );
        Ok(sig)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[inline]
fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Fill `buf` from `r`, stopping early only at end of stream.
/// Returns the number of bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
