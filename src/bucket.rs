//! Packed bucket header.
//!
//! Every bucket starts with one 64-bit header word followed by the value
//! payload. The header packs three fields with explicit masks and shifts
//! rather than bit-fields, so the encoding is the same on every target:
//!
//! - bits 0–55: the key (the table's key domain is 56 bits)
//! - bits 56–62: `next_probe`, an index into the table's probe-offset array
//! - bit 63: `direct_hit`, set when the bucket holds the key whose home
//!   bucket is this bucket

/// `next_probe` value marking an unoccupied slot. Index 0 of the probe table
/// is reserved so a zeroed arena reads as all-empty.
pub(crate) const EMPTY_SLOT: u8 = 0;

/// `next_probe` value terminating a chain. Index 127 of the probe table is
/// reserved and never used as a real offset.
pub(crate) const NO_MORE_PROBES: u8 = 127;

/// Number of entries in the probe-offset array, including both sentinels.
pub(crate) const MAX_PROBES: usize = 128;

pub(crate) const KEY_BITS: u32 = 56;
pub(crate) const KEY_MASK: u64 = (1 << KEY_BITS) - 1;

const PROBE_SHIFT: u32 = KEY_BITS;
const PROBE_MASK: u64 = 0x7F;
const DIRECT_HIT_BIT: u64 = 1 << 63;

/// One packed bucket header word.
///
/// An all-zero header is an empty slot; occupancy is carried entirely by the
/// `next_probe` field, independent of the key and value bit patterns.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header(u64);

impl Header {
    #[inline(always)]
    pub(crate) fn new(key: u64, next_probe: u8, direct_hit: bool) -> Self {
        debug_assert!(key <= KEY_MASK);
        debug_assert!((next_probe as usize) < MAX_PROBES);
        let mut word = key & KEY_MASK;
        word |= ((next_probe as u64) & PROBE_MASK) << PROBE_SHIFT;
        if direct_hit {
            word |= DIRECT_HIT_BIT;
        }
        Header(word)
    }

    #[inline(always)]
    pub(crate) fn from_bits(bits: u64) -> Self {
        Header(bits)
    }

    #[inline(always)]
    pub(crate) fn to_bits(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub(crate) fn key(self) -> u64 {
        self.0 & KEY_MASK
    }

    #[inline(always)]
    pub(crate) fn next_probe(self) -> u8 {
        ((self.0 >> PROBE_SHIFT) & PROBE_MASK) as u8
    }

    #[inline(always)]
    pub(crate) fn direct_hit(self) -> bool {
        self.0 & DIRECT_HIT_BIT != 0
    }

    #[inline(always)]
    pub(crate) fn is_empty(self) -> bool {
        self.next_probe() == EMPTY_SLOT
    }

    /// Returns this header with `next_probe` replaced.
    #[inline(always)]
    pub(crate) fn with_next_probe(self, next_probe: u8) -> Self {
        debug_assert!((next_probe as usize) < MAX_PROBES);
        Header((self.0 & !(PROBE_MASK << PROBE_SHIFT)) | ((next_probe as u64) << PROBE_SHIFT))
    }
}

impl core::fmt::Debug for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Header")
            .field("key", &self.key())
            .field("next_probe", &self.next_probe())
            .field("direct_hit", &self.direct_hit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_isolated() {
        let h = Header::new(KEY_MASK, 126, true);
        assert_eq!(h.key(), KEY_MASK);
        assert_eq!(h.next_probe(), 126);
        assert!(h.direct_hit());

        let h = Header::new(0, NO_MORE_PROBES, false);
        assert_eq!(h.key(), 0);
        assert_eq!(h.next_probe(), NO_MORE_PROBES);
        assert!(!h.direct_hit());
    }

    #[test]
    fn zero_word_is_empty() {
        assert!(Header::from_bits(0).is_empty());
        // occupancy depends only on next_probe, not on key or direct bits
        assert!(!Header::new(0, NO_MORE_PROBES, false).is_empty());
        assert!(Header::new(0x00DE_AD00_0000_BEEF, EMPTY_SLOT, true).is_empty());
    }

    #[test]
    fn with_next_probe_preserves_other_fields() {
        let h = Header::new(0x1234_5678, 3, true).with_next_probe(NO_MORE_PROBES);
        assert_eq!(h.key(), 0x1234_5678);
        assert_eq!(h.next_probe(), NO_MORE_PROBES);
        assert!(h.direct_hit());
    }

    #[test]
    fn round_trips_through_raw_bits() {
        let h = Header::new(987_654_321, 42, false);
        assert_eq!(Header::from_bits(h.to_bits()), h);
    }
}
