// Fixed-capacity ring buffer holding the encoder's sliding window.
//
// Sliding by one byte overwrites the oldest slot in place, so the steady
// state never moves window contents.  A contiguous copy is only made when
// the index reports a weak-checksum candidate.

/// Sliding window over the target, at most one block long.
#[derive(Clone, Debug)]
pub(crate) struct Window {
    buf: Vec<u8>,
    /// Slot of the oldest byte.
    head: usize,
    len: usize,
}

impl Window {
    /// `capacity` must be non-zero.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            buf: vec![0u8; capacity],
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Append `byte`.  When the window is full the oldest byte is
    /// overwritten and returned.
    #[inline]
    pub(crate) fn push_back(&mut self, byte: u8) -> Option<u8> {
        let cap = self.buf.len();
        if self.len < cap {
            self.buf[(self.head + self.len) % cap] = byte;
            self.len += 1;
            None
        } else {
            let out = std::mem::replace(&mut self.buf[self.head], byte);
            self.head = (self.head + 1) % cap;
            Some(out)
        }
    }

    #[inline]
    pub(crate) fn pop_front(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % self.buf.len();
        self.len -= 1;
        Some(byte)
    }

    pub(crate) fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Window contents in order, split where the ring wraps.
    pub(crate) fn as_slices(&self) -> (&[u8], &[u8]) {
        let end = self.head + self.len;
        if end <= self.buf.len() {
            (&self.buf[self.head..end], &[])
        } else {
            let wrapped = end - self.buf.len();
            (&self.buf[self.head..], &self.buf[..wrapped])
        }
    }

    /// Replace the contents of `dest` with the window, oldest byte first.
    pub(crate) fn copy_into(&self, dest: &mut Vec<u8>) {
        let (front, back) = self.as_slices();
        dest.clear();
        dest.extend_from_slice(front);
        dest.extend_from_slice(back);
    }
}
