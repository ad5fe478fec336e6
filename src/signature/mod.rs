// Basis signatures.
//
// - `format`: signature parameters, in-memory model and wire codec
// - `builder`: streaming and one-shot signature generation
// - `index`: weak-checksum lookup table consumed by the delta encoder

pub mod builder;
pub mod format;
pub mod index;

#[cfg(feature = "parallel")]
pub use builder::build_signature_parallel;
pub use builder::{SignatureBuilder, build_signature, hash_block, signature_of};
pub use format::{BlockHash, DEFAULT_BLOCK_LEN, HEADER_LEN, Signature, SignatureOptions};
pub use index::{IndexEntry, Probe, SignatureIndex};
