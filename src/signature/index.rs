// Weak-checksum lookup table over a signature.
//
// Each bucket holds every block sharing one weak checksum, in ascending
// block order.  A probe computes the window's strong sum at most once and
// returns the first block in the bucket whose strong sum matches, so ties
// between identical blocks always resolve to the lowest block index.

use rustc_hash::FxHashMap;

use crate::hash::HashFamily;

use super::format::{Signature, SignatureOptions};

/// One candidate block in a weak-checksum bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub block_index: u32,
    pub strong: Vec<u8>,
}

/// Outcome of probing the index with one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// No block has this weak checksum.
    Miss,
    /// Weak checksum collided but no strong sum matched.
    WeakOnly,
    /// Block index of the confirmed match.
    Hit(u32),
}

/// Read-only lookup structure built once per signature.
#[derive(Debug, Clone)]
pub struct SignatureIndex {
    options: SignatureOptions,
    block_count: u32,
    table: FxHashMap<u32, Vec<IndexEntry>>,
}

impl SignatureIndex {
    /// Index every block of `sig`, preserving block order within buckets.
    pub fn new(sig: &Signature) -> Self {
        let mut table: FxHashMap<u32, Vec<IndexEntry>> = FxHashMap::default();
        table.reserve(sig.len());
        let mut block_count = 0u32;
        for (i, block) in sig.blocks().iter().enumerate() {
            let Ok(block_index) = u32::try_from(i) else {
                log::warn!("signature has more than {} blocks, ignoring the rest", u32::MAX);
                break;
            };
            table.entry(block.weak).or_default().push(IndexEntry {
                block_index,
                strong: block.strong.clone(),
            });
            block_count = block_index + 1;
        }
        log::debug!(
            "indexed {block_count} blocks into {} weak buckets",
            table.len()
        );
        Self {
            options: sig.options(),
            block_count,
            table,
        }
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

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    /// Candidates for `weak`, lowest block index first.
    #[inline]
    pub fn lookup(&self, weak: u32) -> &[IndexEntry] {
        self.table.get(&weak).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Probe with a window whose weak checksum is `weak`.
    pub fn probe(&self, weak: u32, window: &[u8]) -> Probe {
        let candidates = self.lookup(weak);
        if candidates.is_empty() {
            return Probe::Miss;
        }
        let strong = self
            .options
            .family
            .strong_sum(window, self.options.strong_len as usize);
        candidates
            .iter()
            .find(|entry| entry.strong == strong)
            .map_or(Probe::WeakOnly, |entry| Probe::Hit(entry.block_index))
    }

    /// Block index matching `window`, if any.
    pub fn find(&self, weak: u32, window: &[u8]) -> Option<u32> {
        match self.probe(weak, window) {
            Probe::Hit(block) => Some(block),
            Probe::Miss | Probe::WeakOnly => None,
        }
    }

    /// Absolute basis offset of `block_index`.
    #[inline]
    pub fn block_offset(&self, block_index: u32) -> u64 {
        u64::from(block_index) * u64::from(self.options.block_len)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
