// Hashing primitives shared by signature generation and delta encoding.
//
// - `rolling`: librsync rollsum weak checksum (O(1) slide)
// - `strong`: MD4 / BLAKE2b-256 strong block digests

pub mod rolling;
pub mod strong;

pub use rolling::{RollingChecksum, weak_checksum};
pub use strong::{BLAKE2_SIG_MAGIC, HashFamily, MD4_SIG_MAGIC};
