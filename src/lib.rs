//! Oxisync: rsync-style signature, delta and patch in Rust.
//!
//! The three steps of a remote file update, in librsync's wire formats:
//! - `signature`: block hashes of a basis file
//! - `delta`: a new file expressed as COPY/LITERAL commands against that
//!   signature
//! - `patch`: the new file rebuilt from the basis and the delta
//!
//! Plus hashing primitives (`hash`), file-oriented helpers (`io`) and an
//! optional CLI (`cli` feature).
//!
//! # Quick Start
//!
//! ```
//! use oxisync::signature::{SignatureOptions, signature_of};
//! use oxisync::delta::delta_all;
//! use oxisync::patch::patch_all;
//!
//! let basis = b"hello old world, hello old world";
//! let target = b"hello new world, hello old world";
//!
//! let sig = signature_of(basis, SignatureOptions::default()).unwrap();
//! let delta = delta_all(&sig.build_index(), target).unwrap();
//! let rebuilt = patch_all(basis, &delta).unwrap();
//! assert_eq!(rebuilt, target);
//! ```

pub mod delta;
pub mod error;
pub mod hash;
pub mod io;
pub mod patch;
pub mod signature;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
