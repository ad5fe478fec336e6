// File-level helpers for signature, delta and patch.
//
// Provides `signature_file()`, `delta_file()` and `patch_file()` which wrap
// the streaming APIs with buffered file I/O.  Optionally computes streaming
// SHA-256 checksums (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::delta::{DeltaEncoder, DeltaStats, EncodeOptions};
use crate::error::Result;
use crate::patch::{PatchStats, apply_delta};
use crate::signature::{Signature, SignatureOptions};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `signature_file()`.
#[derive(Debug, Clone)]
pub struct SignatureFileStats {
    /// Basis file size in bytes.
    pub basis_size: u64,
    /// Signature output size in bytes.
    pub signature_size: u64,
    /// Number of basis blocks.
    pub blocks: u64,
    /// SHA-256 of the basis file (if `file-io` feature is enabled).
    pub basis_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `delta_file()`.
#[derive(Debug, Clone)]
pub struct DeltaFileStats {
    pub signature_size: u64,
    pub target_size: u64,
    pub delta_size: u64,
    /// Command counters from the encoder.
    pub delta: DeltaStats,
    /// SHA-256 of the target file (if `file-io` feature is enabled).
    pub target_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchFileStats {
    pub basis_size: u64,
    pub delta_size: u64,
    pub output_size: u64,
    /// Command counters from the patcher.
    pub patch: PatchStats,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// signature_file
// ---------------------------------------------------------------------------

/// Write the signature of `basis_path` to `signature_path`.
///
/// The basis is streamed; only one block (one batch with the `parallel`
/// feature) is held in memory.
pub fn signature_file(
    basis_path: &Path,
    signature_path: &Path,
    opts: SignatureOptions,
) -> Result<SignatureFileStats> {
    let basis_file = File::open(basis_path)?;
    let basis_size = basis_file.metadata()?.len();
    let mut basis = Hashing::new(BufReader::with_capacity(BUF_SIZE, basis_file));

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(signature_path)?);

    #[cfg(feature = "parallel")]
    let sig = crate::signature::build_signature_parallel(&mut basis, &mut writer, opts)?;
    #[cfg(not(feature = "parallel"))]
    let sig = crate::signature::build_signature(&mut basis, &mut writer, opts)?;

    let signature_size = finish_file(writer)?;
    log::info!(
        "signature: {} -> {} ({} blocks)",
        basis_path.display(),
        signature_path.display(),
        sig.len()
    );

    Ok(SignatureFileStats {
        basis_size,
        signature_size,
        blocks: sig.len() as u64,
        basis_sha256: basis.digest(),
    })
}

/// Parse a signature file.
pub fn read_signature_file(path: &Path) -> Result<Signature> {
    let file = File::open(path)?;
    Signature::read_from(BufReader::with_capacity(BUF_SIZE, file))
}

// ---------------------------------------------------------------------------
// delta_file
// ---------------------------------------------------------------------------

/// Compute the delta of `target_path` against the basis described by
/// `signature_path`, writing it to `delta_path`.
pub fn delta_file(
    signature_path: &Path,
    target_path: &Path,
    delta_path: &Path,
    opts: EncodeOptions,
) -> Result<DeltaFileStats> {
    let signature_size = std::fs::metadata(signature_path)?.len();
    let sig = read_signature_file(signature_path)?;
    let index = sig.build_index();

    let target_file = File::open(target_path)?;
    let target_size = target_file.metadata()?.len();
    let mut target = Hashing::new(BufReader::with_capacity(BUF_SIZE, target_file));

    let writer = BufWriter::with_capacity(BUF_SIZE, File::create(delta_path)?);
    let mut encoder = DeltaEncoder::with_options(writer, &index, opts)?;

    encoder.write_target_from(&mut target)?;

    let (writer, delta) = encoder.finish()?;
    let delta_size = finish_file(writer)?;
    log::info!(
        "delta: {} -> {} ({} -> {} bytes)",
        target_path.display(),
        delta_path.display(),
        target_size,
        delta_size
    );

    Ok(DeltaFileStats {
        signature_size,
        target_size,
        delta_size,
        delta,
        target_sha256: target.digest(),
    })
}

// ---------------------------------------------------------------------------
// patch_file
// ---------------------------------------------------------------------------

/// Apply `delta_path` to `basis_path`, writing the result to `output_path`.
///
/// The basis is accessed by seeking, so it is never read fully into memory.
pub fn patch_file(
    basis_path: &Path,
    delta_path: &Path,
    output_path: &Path,
) -> Result<PatchFileStats> {
    let basis_file = File::open(basis_path)?;
    let basis_size = basis_file.metadata()?.len();
    let basis = BufReader::with_capacity(BUF_SIZE, basis_file);

    let delta_file = File::open(delta_path)?;
    let delta_size = delta_file.metadata()?.len();
    let delta = BufReader::with_capacity(BUF_SIZE, delta_file);

    let output_file = File::create(output_path)?;
    let mut output = Hashing::new(BufWriter::with_capacity(BUF_SIZE, output_file));
    let patch = apply_delta(basis, delta, &mut output)?;
    let output_sha256 = output.digest();
    let output_size = finish_file(output.into_inner())?;
    log::info!(
        "patch: {} + {} -> {} ({output_size} bytes)",
        basis_path.display(),
        delta_path.display(),
        output_path.display()
    );

    Ok(PatchFileStats {
        basis_size,
        delta_size,
        output_size,
        patch,
        output_sha256,
    })
}

/// Flush a buffered file writer and return the file's final size.
fn finish_file(writer: BufWriter<File>) -> Result<u64> {
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(file.metadata()?.len())
}

// ---------------------------------------------------------------------------
// Hashing adapter
// ---------------------------------------------------------------------------

/// Reader/writer adapter that feeds every byte passing through it into a
/// SHA-256 hasher (a no-op without the `file-io` feature).
struct Hashing<T> {
    inner: T,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<T> Hashing<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            #[cfg(feature = "file-io")]
            hasher: <sha2::Sha256 as sha2::Digest>::new(),
        }
    }

    #[cfg(feature = "file-io")]
    fn update(&mut self, data: &[u8]) {
        sha2::Digest::update(&mut self.hasher, data);
    }

    #[cfg(not(feature = "file-io"))]
    fn update(&mut self, _data: &[u8]) {}

    #[cfg(feature = "file-io")]
    fn digest(&self) -> Option<[u8; 32]> {
        Some(sha2::Digest::finalize(self.hasher.clone()).into())
    }

    #[cfg(not(feature = "file-io"))]
    fn digest(&self) -> Option<[u8; 32]> {
        None
    }

    fn into_inner(self) -> T {
        self.inner
    }
}

impl<R: Read> Read for Hashing<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.update(&buf[..n]);
        Ok(n)
    }
}

impl<W: Write> Write for Hashing<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
