//! Framed byte buffer (C1): a linear, append-shift, **non-ring** buffer.
//!
//! Codec libraries assume contiguous input/output and emit variable-length
//! frames; a ring buffer would force a double-copy to present a contiguous
//! view, so this type deliberately isn't one (spec §4.1, §9). `shift` is the
//! only reclaim primitive.
//!
//! Generic over the element type so the same buffer code backs both the PCM
//! staging buffer (`Ffb<i16>`, `Ffb<i32>`, ...) and the byte-oriented BT
//! staging buffer (`Ffb<u8>`).

#[derive(Debug)]
pub struct Ffb<T> {
    buf: Vec<T>,
    /// Number of valid (written) elements at the front of `buf`. Spec calls
    /// this the buffer's "head-in" position; `len_out` is just `len`, and
    /// `len_in` is `capacity - len` — there is no independent head-out
    /// pointer, since the only way to consume is `shift`, which always
    /// drops from offset zero.
    len: usize,
}

impl<T: Copy + Default> Ffb<T> {
    /// `init(n_elements, element_size)` — `element_size` is implicit in `T`.
    pub fn new(capacity: usize) -> Self {
        Ffb {
            buf: vec![T::default(); capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Writable elements remaining.
    pub fn len_in(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Readable elements.
    pub fn len_out(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The written-but-unshifted region, for reading.
    pub fn data(&self) -> &[T] {
        &self.buf[..self.len]
    }

    /// The free region at the tail, for writing in place (e.g. a codec's
    /// `encode_into(ffb.tail_mut())`); follow with `seek` to commit.
    pub fn tail_mut(&mut self) -> &mut [T] {
        &mut self.buf[self.len..]
    }

    /// Advance the head-in position by `n` after writing `n` elements into
    /// `tail_mut()`.
    pub fn seek(&mut self, n: usize) {
        assert!(
            n <= self.len_in(),
            "seek({n}) exceeds {} free elements",
            self.len_in()
        );
        self.len += n;
    }

    /// Drop `n` elements from the front, memmoving the rest down to offset
    /// zero. `shift` is the only reclaim primitive: this is not a ring.
    pub fn shift(&mut self, n: usize) {
        assert!(n <= self.len, "shift({n}) exceeds {} valid elements", self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Reset to empty without touching the storage (head-in = head-out = 0).
    pub fn rewind(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_seek_law() {
        let mut ffb: Ffb<u8> = Ffb::new(16);
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        ffb.tail_mut()[..src.len()].copy_from_slice(&src);
        ffb.seek(src.len());

        ffb.shift(3);
        assert_eq!(ffb.len_out(), src.len() - 3);
        assert_eq!(ffb.data(), &src[3..]);
    }

    #[test]
    fn rewind_clears_without_touching_capacity() {
        let mut ffb: Ffb<u8> = Ffb::new(8);
        ffb.tail_mut()[0] = 42;
        ffb.seek(1);
        ffb.rewind();
        assert_eq!(ffb.len_out(), 0);
        assert_eq!(ffb.len_in(), 8);
    }

    #[test]
    #[should_panic]
    fn seek_beyond_capacity_panics() {
        let mut ffb: Ffb<u8> = Ffb::new(4);
        ffb.seek(5);
    }

    #[test]
    #[should_panic]
    fn shift_beyond_len_panics() {
        let mut ffb: Ffb<u8> = Ffb::new(4);
        ffb.seek(2);
        ffb.shift(3);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn shift_seek_law_holds(data in proptest::collection::vec(any::<u8>(), 0..64), m in 0usize..64) {
            let n = data.len();
            let m = m.min(n);
            let mut ffb: Ffb<u8> = Ffb::new(n.max(1));
            ffb.tail_mut()[..n].copy_from_slice(&data);
            ffb.seek(n);
            ffb.shift(m);
            prop_assert_eq!(ffb.len_out(), n - m);
            prop_assert_eq!(ffb.data(), &data[m..]);
        }
    }
}
