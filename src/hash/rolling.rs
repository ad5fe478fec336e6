// Rolling weak checksum matching librsync's "rollsum".
//
// Two 16-bit accumulators over the current window, each input byte biased
// by CHAR_OFFSET:
//   s1 = sum(b_i + 31)                  mod 2^16
//   s2 = sum over prefixes of s1        mod 2^16
// The 32-bit digest packs s2 into the high half and s1 into the low half.
//
// The window can grow (roll_in), shrink from the front (roll_out) or slide
// by one byte (rotate) in O(1).

/// Bias added to every byte, as in librsync's `RS_CHAR_OFFSET`.
pub const CHAR_OFFSET: u16 = 31;

/// Rolling checksum state for one window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RollingChecksum {
    s1: u16,
    s2: u16,
    count: u64,
}

impl RollingChecksum {
    /// Empty window.
    pub const fn new() -> Self {
        Self {
            s1: 0,
            s2: 0,
            count: 0,
        }
    }

    /// Forget every byte seen so far.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of bytes currently in the window.
    #[inline]
    pub fn len(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bulk-append `data` to the window.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for &b in data {
            s1 = s1.wrapping_add(u16::from(b) + CHAR_OFFSET);
            s2 = s2.wrapping_add(s1);
        }
        self.s1 = s1;
        self.s2 = s2;
        self.count += data.len() as u64;
    }

    /// Append one byte to a window that has not reached its full size.
    #[inline(always)]
    pub fn roll_in(&mut self, incoming: u8) {
        self.s1 = self.s1.wrapping_add(u16::from(incoming) + CHAR_OFFSET);
        self.s2 = self.s2.wrapping_add(self.s1);
        self.count += 1;
    }

    /// Drop the oldest byte of the window, shrinking it by one.
    ///
    /// `outgoing` must be the first byte of the current window.
    #[inline(always)]
    pub fn roll_out(&mut self, outgoing: u8) {
        debug_assert!(self.count > 0, "roll_out on an empty window");
        let out = u16::from(outgoing) + CHAR_OFFSET;
        self.s1 = self.s1.wrapping_sub(out);
        self.s2 = self.s2.wrapping_sub((self.count as u16).wrapping_mul(out));
        self.count -= 1;
    }

    /// Slide the window by one byte: drop `outgoing`, append `incoming`.
    #[inline(always)]
    pub fn rotate(&mut self, outgoing: u8, incoming: u8) {
        debug_assert!(self.count > 0, "rotate on an empty window");
        self.s1 = self
            .s1
            .wrapping_add(u16::from(incoming))
            .wrapping_sub(u16::from(outgoing));
        self.s2 = self.s2.wrapping_add(self.s1).wrapping_sub(
            (self.count as u16).wrapping_mul(u16::from(outgoing) + CHAR_OFFSET),
        );
    }

    /// The packed 32-bit weak checksum.
    #[inline(always)]
    pub fn value(&self) -> u32 {
        (u32::from(self.s2) << 16) | u32::from(self.s1)
    }
}

/// Weak checksum of a whole block, computed from scratch.
#[inline]
pub fn weak_checksum(block: &[u8]) -> u32 {
    let mut sum = RollingChecksum::new();
    sum.update(block);
    sum.value()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
