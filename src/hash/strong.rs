// Strong block digests.
//
// The hash family is chosen once, by the signature magic number, and
// dispatched through `HashFamily`.  New families extend the enum and the
// match arms below.

use blake2::Blake2b;
use digest::Digest;
use digest::consts::U32;

use crate::error::{Error, Result};

/// Signature magic for MD4 strong sums (librsync `RS_MD4_SIG_MAGIC`).
pub const MD4_SIG_MAGIC: u32 = 0x7273_0136;

/// Signature magic for BLAKE2 strong sums (librsync `RS_BLAKE2_SIG_MAGIC`).
pub const BLAKE2_SIG_MAGIC: u32 = 0x7273_0137;

type Blake2b256 = Blake2b<U32>;

/// Strong hash family of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashFamily {
    /// 128-bit MD4.
    Md4,
    /// BLAKE2b with a 256-bit output.
    #[default]
    Blake2,
}

impl HashFamily {
    /// Look up the family for a signature magic number.
    pub fn from_magic(magic: u32) -> Result<Self> {
        match magic {
            MD4_SIG_MAGIC => Ok(Self::Md4),
            BLAKE2_SIG_MAGIC => Ok(Self::Blake2),
            other => Err(Error::invalid_config(format!(
                "unknown signature magic {other:#010x}"
            ))),
        }
    }

    /// The magic number written at the start of a signature.
    pub const fn magic(self) -> u32 {
        match self {
            Self::Md4 => MD4_SIG_MAGIC,
            Self::Blake2 => BLAKE2_SIG_MAGIC,
        }
    }

    /// Untruncated digest length in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md4 => 16,
            Self::Blake2 => 32,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Md4 => "md4",
            Self::Blake2 => "blake2",
        }
    }

    /// Digest of `data`, truncated to `strong_len` bytes.
    ///
    /// `strong_len` must not exceed [`digest_len`](Self::digest_len);
    /// callers validate it when the signature parameters are built.
    pub fn strong_sum(self, data: &[u8], strong_len: usize) -> Vec<u8> {
        debug_assert!(strong_len <= self.digest_len());
        let mut out = match self {
            Self::Md4 => md4::Md4::digest(data).to_vec(),
            Self::Blake2 => Blake2b256::digest(data).to_vec(),
        };
        out.truncate(strong_len);
        out
    }
}

impl std::fmt::Display for HashFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
