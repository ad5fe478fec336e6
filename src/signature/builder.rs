// Signature generation.
//
// SignatureBuilder provides a streaming API:
//   - The header is written as soon as the builder is created
//   - Basis data is fed in arbitrary chunks via write_basis()
//   - Each complete block is hashed and written immediately
//   - finish() hashes the trailing short block, if any
//
// Only one block of basis data is buffered at a time.

use std::io::{self, Read, Write};

use crate::error::Result;
use crate::hash::{HashFamily, weak_checksum};

use super::format::{BlockHash, Signature, SignatureOptions};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Read buffer used by [`build_signature`].
const READ_BUF_SIZE: usize = 64 * 1024;

/// Weak and strong hash of one basis block.
#[inline]
pub fn hash_block(family: HashFamily, block: &[u8], strong_len: usize) -> BlockHash {
    BlockHash {
        weak: weak_checksum(block),
        strong: family.strong_sum(block, strong_len),
    }
}

// ---------------------------------------------------------------------------
// SignatureBuilder
// ---------------------------------------------------------------------------

/// Streaming signature generator.
///
/// # Example
/// ```
/// use oxisync::signature::{SignatureBuilder, SignatureOptions};
/// let mut out = Vec::new();
/// let mut builder = SignatureBuilder::new(&mut out, SignatureOptions::default()).unwrap();
/// builder.write_basis(b"basis data").unwrap();
/// let (_, sig) = builder.finish().unwrap();
/// assert_eq!(sig.len(), 1);
/// ```
pub struct SignatureBuilder<W: Write> {
    output: W,
    signature: Signature,
    block_len: usize,
    strong_len: usize,
    pending: Vec<u8>,
    basis_len: u64,
}

impl<W: Write> SignatureBuilder<W> {
    /// Validate `options` and write the signature header.
    pub fn new(mut output: W, options: SignatureOptions) -> Result<Self> {
        let signature = Signature::new(options)?;
        options.write_header(&mut output)?;
        Ok(Self {
            output,
            signature,
            block_len: options.block_len as usize,
            strong_len: options.strong_len as usize,
            pending: Vec::new(),
            basis_len: 0,
        })
    }

    /// Feed basis data.  Every block completed by `data` is written out.
    pub fn write_basis(&mut self, data: &[u8]) -> Result<()> {
        self.basis_len += data.len() as u64;
        let mut offset = 0usize;

        // Complete a partially buffered block first.
        if !self.pending.is_empty() {
            let take = (self.block_len - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            offset = take;

            if self.pending.len() == self.block_len {
                let block = std::mem::take(&mut self.pending);
                self.emit_block(&block)?;
                self.pending = block;
                self.pending.clear();
            }
        }

        // Hash full blocks straight from the caller's buffer.
        while offset + self.block_len <= data.len() {
            let end = offset + self.block_len;
            self.emit_block(&data[offset..end])?;
            offset = end;
        }

        if offset < data.len() {
            self.pending.extend_from_slice(&data[offset..]);
        }
        Ok(())
    }

    /// Hash the trailing short block and return the writer and signature.
    pub fn finish(mut self) -> Result<(W, Signature)> {
        if !self.pending.is_empty() {
            let block = std::mem::take(&mut self.pending);
            self.emit_block(&block)?;
        }
        self.output.flush()?;
        log::debug!(
            "signature: basis {} bytes, {} blocks of {} ({}, strong_len={})",
            self.basis_len,
            self.signature.len(),
            self.block_len,
            self.signature.family(),
            self.strong_len
        );
        Ok((self.output, self.signature))
    }

    /// Basis bytes consumed so far.
    pub fn basis_len(&self) -> u64 {
        self.basis_len
    }

    fn emit_block(&mut self, block: &[u8]) -> io::Result<()> {
        let hashed = hash_block(self.signature.family(), block, self.strong_len);
        hashed.write_to(&mut self.output)?;
        self.signature.push(hashed);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Read `basis` to end of stream, writing its signature to `output`.
///
/// Returns the in-memory signature as well, ready for
/// [`Signature::build_index`].
pub fn build_signature<R: Read, W: Write>(
    mut basis: R,
    output: W,
    options: SignatureOptions,
) -> Result<Signature> {
    let mut builder = SignatureBuilder::new(output, options)?;
    let mut buf = vec![0u8; READ_BUF_SIZE.max(options.block_len as usize)];
    loop {
        let n = match basis.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        builder.write_basis(&buf[..n])?;
    }
    let (_, sig) = builder.finish()?;
    Ok(sig)
}

/// Signature of an in-memory basis, without serializing it.
pub fn signature_of(basis: &[u8], options: SignatureOptions) -> Result<Signature> {
    build_signature(basis, io::sink(), options)
}

/// Basis bytes hashed per parallel batch (rounded to whole blocks).
#[cfg(feature = "parallel")]
const PARALLEL_BATCH_BYTES: usize = 4 * 1024 * 1024;

/// Like [`build_signature`], but hashes batches of blocks on the rayon pool.
///
/// Output is byte-for-byte identical to the sequential builder.  Memory
/// is bounded by one batch of basis data.
#[cfg(feature = "parallel")]
pub fn build_signature_parallel<R: Read, W: Write>(
    mut basis: R,
    mut output: W,
    options: SignatureOptions,
) -> Result<Signature> {
    let mut sig = Signature::new(options)?;
    options.write_header(&mut output)?;

    let family = options.family;
    let block_len = options.block_len as usize;
    let strong_len = options.strong_len as usize;
    let batch_blocks = (PARALLEL_BATCH_BYTES / block_len).max(1);
    let mut batch = vec![0u8; block_len * batch_blocks];
    let mut basis_len = 0u64;

    loop {
        let n = super::format::read_full(&mut basis, &mut batch)?;
        if n == 0 {
            break;
        }
        basis_len += n as u64;

        let hashed: Vec<BlockHash> = batch[..n]
            .par_chunks(block_len)
            .map(|block| hash_block(family, block, strong_len))
            .collect();
        for block in hashed {
            block.write_to(&mut output)?;
            sig.push(block);
        }

        if n < batch.len() {
            break;
        }
    }

    output.flush()?;
    log::debug!(
        "parallel signature: basis {basis_len} bytes, {} blocks",
        sig.len()
    );
    Ok(sig)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::signature::format::HEADER_LEN;

    fn opts(block_len: u32) -> SignatureOptions {
        SignatureOptions::new(HashFamily::Md4, block_len, 8).unwrap()
    }

    #[test]
    fn blocks_follow_basis_order() {
        let basis = b"0123456789";
        let mut out = Vec::new();
        let sig = build_signature(&basis[..], &mut out, opts(4)).unwrap();

        assert_eq!(sig.len(), 3);
        assert_eq!(sig.blocks()[0], hash_block(HashFamily::Md4, b"0123", 8));
        assert_eq!(sig.blocks()[1], hash_block(HashFamily::Md4, b"4567", 8));
        // Last block is short.
        assert_eq!(sig.blocks()[2], hash_block(HashFamily::Md4, b"89", 8));
        assert_eq!(out, sig.to_bytes());
    }

    #[test]
    fn exact_multiple_has_no_short_block() {
        let sig = signature_of(&[7u8; 12], opts(4)).unwrap();
        assert_eq!(sig.len(), 3);
    }

    #[test]
    fn empty_basis_writes_header_only() {
        let mut out = Vec::new();
        let sig = build_signature(&b""[..], &mut out, opts(4)).unwrap();
        assert!(sig.is_empty());
        assert_eq!(out.len(), HEADER_LEN);
    }

    #[test]
    fn chunking_does_not_change_output() {
        let basis: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
        let expected = signature_of(&basis, opts(64)).unwrap().to_bytes();

        for chunk in [1usize, 3, 63, 64, 65, 1000] {
            let mut out = Vec::new();
            let mut b = SignatureBuilder::new(&mut out, opts(64)).unwrap();
            for piece in basis.chunks(chunk) {
                b.write_basis(piece).unwrap();
            }
            assert_eq!(b.basis_len(), basis.len() as u64);
            b.finish().unwrap();
            assert_eq!(out, expected, "chunk size {chunk}");
        }
    }

    #[test]
    fn invalid_options_fail_before_writing() {
        let mut out = Vec::new();
        let bad = SignatureOptions {
            family: HashFamily::Md4,
            block_len: 0,
            strong_len: 8,
        };
        assert!(matches!(
            build_signature(&b"abc"[..], &mut out, bad),
            Err(Error::InvalidConfig(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn read_errors_propagate() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone"))
            }
        }
        assert!(matches!(
            build_signature(Failing, io::sink(), opts(4)),
            Err(Error::Io(_))
        ));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_output_matches_sequential() {
        let basis: Vec<u8> = (0..200_000u32).map(|i| (i.wrapping_mul(31) >> 3) as u8).collect();
        for block_len in [1u32, 100, 512, 4096] {
            let o = opts(block_len);
            let mut seq = Vec::new();
            let mut par = Vec::new();
            let a = build_signature(basis.as_slice(), &mut seq, o).unwrap();
            let b = build_signature_parallel(basis.as_slice(), &mut par, o).unwrap();
            assert_eq!(a, b);
            assert_eq!(seq, par, "block_len {block_len}");
        }
    }
}
