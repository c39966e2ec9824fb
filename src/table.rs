//! The untyped core table.
//!
//! `RawTable` owns a single flat byte arena of `num_buckets * bucket_size`
//! bytes. Each bucket is a packed 64-bit header (see [`crate::bucket`])
//! followed by `value_size` opaque payload bytes, padded so the stride is a
//! multiple of 8. Callers that want typed values should go through
//! [`crate::FlatMap56`] instead.

use core::alloc::Layout;
use core::fmt::Debug;
use core::ptr::NonNull;

use crate::bucket::Header;
use crate::bucket::KEY_BITS;
use crate::bucket::KEY_MASK;
use crate::bucket::MAX_PROBES;
use crate::bucket::NO_MORE_PROBES;
use crate::probe::build_probes;

/// 64-bit fractional-golden-ratio constant for multiplicative hashing. The
/// high bits of `key * C` are uniformly distributed regardless of key
/// patterning, so the home index is just the product shifted down.
const HASH_CONSTANT: u64 = 0x9E3779B97F4A7C55;

const HEADER_SIZE: usize = core::mem::size_of::<u64>();

/// Arena alignment. The stride is rounded up to this, which keeps every
/// header word naturally aligned and gives value payloads 8-byte alignment.
const VALUE_ALIGN: usize = 8;

/// Error returned when a bucket array cannot be allocated.
///
/// Every operation that can return this leaves the table in its previous
/// valid state: a failed `insert` keeps all existing entries intact, and a
/// failed resize keeps the old bucket array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("bucket array allocation failed")
    }
}

impl core::error::Error for AllocError {}

/// An integer-keyed open-addressing hash table over untyped fixed-size
/// values.
///
/// Keys are `u64` truncated to their low 56 bits; two keys that agree in the
/// low 56 bits refer to the same entry. Values are opaque byte payloads whose
/// size is fixed at creation time and uniform for all entries.
///
/// Collisions are resolved through a precomputed geometric probe sequence.
/// Every occupied bucket belongs to exactly one singly linked chain rooted at
/// the home bucket of its key; a bucket whose `direct_hit` bit is set holds
/// the key that hashes to it. Inserting a key whose home bucket is occupied
/// by a foreign (displaced) entry relocates that entry within its own chain
/// before claiming the slot.
///
/// The table grows ×2 when an insert exhausts its probe budget and shrinks ÷2
/// when a removal drops the load factor below 3/8, never below
/// [`RawTable::MIN_BUCKETS`].
///
/// Not internally synchronized; `&mut self` on every mutating operation is
/// the whole concurrency story.
///
/// ## Example
///
/// ```rust
/// # use flatmap56::RawTable;
/// #
/// let mut table = RawTable::with_capacity(0, 8).unwrap();
///
/// table.insert(77)?.copy_from_slice(&7700u64.to_le_bytes());
/// assert_eq!(table.get(77), Some(&7700u64.to_le_bytes()[..]));
///
/// let mut out = [0u8; 8];
/// assert!(table.remove(77, Some(&mut out)));
/// assert_eq!(u64::from_le_bytes(out), 7700);
/// # Ok::<(), flatmap56::AllocError>(())
/// ```
pub struct RawTable {
    arena: NonNull<u8>,
    num_buckets: usize,
    table_mask: u64,
    hash_shift: u32,
    num_entries: usize,
    value_size: usize,
    bucket_size: usize,
    probes: [u64; MAX_PROBES],
}

// SAFETY: The table exclusively owns its arena and has no interior
// mutability; moving it or sharing immutable references across threads is
// sound even though it holds a raw pointer.
unsafe impl Send for RawTable {}
unsafe impl Sync for RawTable {}

impl Drop for RawTable {
    fn drop(&mut self) {
        // SAFETY: The arena was allocated in `with_buckets` with exactly this
        // layout, and values are opaque bytes with no destructors.
        unsafe {
            alloc::alloc::dealloc(self.arena.as_ptr(), self.layout());
        }
    }
}

impl RawTable {
    /// Minimum bucket count. Creation clamps up to this and shrinking never
    /// goes below it.
    pub const MIN_BUCKETS: usize = 128;

    /// Creates a table holding `value_size`-byte values, with at least
    /// `initial_capacity` buckets.
    ///
    /// The capacity is clamped into `[MIN_BUCKETS, max_bucket_count]` and
    /// rounded up to the next power of two.
    ///
    /// # Errors
    ///
    /// Fails if the bucket array cannot be allocated, or if `value_size` is
    /// so large that even the minimum bucket count overflows the address
    /// space.
    pub fn with_capacity(initial_capacity: usize, value_size: usize) -> Result<Self, AllocError> {
        let bucket_size = bucket_size_for(value_size).ok_or(AllocError)?;
        let max = max_buckets_for(bucket_size);
        if max < Self::MIN_BUCKETS {
            return Err(AllocError);
        }
        let num_buckets = initial_capacity
            .clamp(Self::MIN_BUCKETS, max)
            .next_power_of_two();
        Self::with_buckets(num_buckets, value_size, bucket_size)
    }

    fn with_buckets(
        num_buckets: usize,
        value_size: usize,
        bucket_size: usize,
    ) -> Result<Self, AllocError> {
        debug_assert!(num_buckets.is_power_of_two());
        debug_assert!(num_buckets >= Self::MIN_BUCKETS);

        let bits = num_buckets.trailing_zeros();
        let bytes = num_buckets.checked_mul(bucket_size).ok_or(AllocError)?;
        let layout = Layout::from_size_align(bytes, VALUE_ALIGN).map_err(|_| AllocError)?;

        // SAFETY: The layout is non-empty (at least 128 buckets of at least 8
        // bytes). A zeroed arena reads as all headers empty.
        let arena = unsafe { alloc::alloc::alloc_zeroed(layout) };
        let arena = NonNull::new(arena).ok_or(AllocError)?;

        Ok(RawTable {
            arena,
            num_buckets,
            table_mask: (num_buckets - 1) as u64,
            hash_shift: 64 - bits,
            num_entries: 0,
            value_size,
            bucket_size,
            probes: build_probes(bits),
        })
    }

    fn layout(&self) -> Layout {
        // SAFETY: Size and alignment were validated when the arena was
        // allocated; the fields have not changed since.
        unsafe {
            Layout::from_size_align_unchecked(self.num_buckets * self.bucket_size, VALUE_ALIGN)
        }
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    /// Returns `true` if the table contains no entries.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Returns the current number of buckets. Always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.num_buckets
    }

    /// Returns the value payload size in bytes, fixed at creation.
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Returns `len() / bucket_count()`.
    pub fn load_factor(&self) -> f32 {
        self.num_entries as f32 / self.num_buckets as f32
    }

    /// Returns the largest bucket count this table could grow to, bounded by
    /// the 56-bit key domain and by the address space at this value size.
    pub fn max_bucket_count(&self) -> usize {
        max_buckets_for(self.bucket_size)
    }

    #[inline(always)]
    fn home(&self, key: u64) -> usize {
        (key.wrapping_mul(HASH_CONSTANT) >> self.hash_shift) as usize
    }

    #[inline(always)]
    fn probe_index(&self, home: usize, probe: u8) -> usize {
        ((home as u64).wrapping_add(self.probes[probe as usize]) & self.table_mask) as usize
    }

    #[inline(always)]
    fn slot_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.num_buckets);
        // SAFETY: `index` is a bucket index, so the offset stays inside the
        // arena allocation.
        unsafe { self.arena.as_ptr().add(index * self.bucket_size) }
    }

    #[inline(always)]
    fn header(&self, index: usize) -> Header {
        // SAFETY: Slot pointers are 8-aligned (8-aligned base, stride a
        // multiple of 8) and the header word is always initialized (zeroed at
        // allocation).
        Header::from_bits(unsafe { (self.slot_ptr(index) as *const u64).read() })
    }

    #[inline(always)]
    fn set_header(&mut self, index: usize, header: Header) {
        // SAFETY: Same alignment and bounds argument as `header`.
        unsafe { (self.slot_ptr(index) as *mut u64).write(header.to_bits()) }
    }

    #[inline(always)]
    fn value(&self, index: usize) -> &[u8] {
        // SAFETY: The payload occupies `value_size` bytes starting right
        // after the header, inside the slot's stride.
        unsafe {
            core::slice::from_raw_parts(self.slot_ptr(index).add(HEADER_SIZE), self.value_size)
        }
    }

    #[inline(always)]
    fn value_mut(&mut self, index: usize) -> &mut [u8] {
        // SAFETY: Same bounds argument as `value`; `&mut self` guarantees
        // exclusivity.
        unsafe {
            core::slice::from_raw_parts_mut(self.slot_ptr(index).add(HEADER_SIZE), self.value_size)
        }
    }

    fn copy_value(&mut self, from: usize, to: usize) {
        debug_assert_ne!(from, to);
        // SAFETY: Distinct bucket indices, so the payload ranges cannot
        // overlap.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.slot_ptr(from).add(HEADER_SIZE),
                self.slot_ptr(to).add(HEADER_SIZE),
                self.value_size,
            );
        }
    }

    fn clear_slot(&mut self, index: usize) {
        // SAFETY: Zeroes exactly one slot; a zeroed header is an empty slot.
        unsafe {
            core::ptr::write_bytes(self.slot_ptr(index), 0, self.bucket_size);
        }
    }

    /// Walks `key`'s probe chain and returns its bucket index.
    ///
    /// If the home bucket holds a foreign displaced entry (`direct_hit`
    /// clear), the key cannot be present: had it been inserted, it would have
    /// relocated the occupant and claimed the home slot.
    fn find(&self, key: u64) -> Option<usize> {
        let home = self.home(key);
        let mut index = home;
        let mut header = self.header(index);
        if !header.direct_hit() {
            return None;
        }
        loop {
            if header.key() == key {
                return Some(index);
            }
            let probe = header.next_probe();
            if probe == NO_MORE_PROBES {
                return None;
            }
            index = self.probe_index(home, probe);
            header = self.header(index);
        }
    }

    /// Looks up `key` and returns its value payload.
    ///
    /// Only the low 56 bits of `key` participate in the lookup.
    pub fn get(&self, key: u64) -> Option<&[u8]> {
        self.find(key & KEY_MASK).map(|index| self.value(index))
    }

    /// Looks up `key` and returns its value payload mutably.
    pub fn get_mut(&mut self, key: u64) -> Option<&mut [u8]> {
        self.find(key & KEY_MASK).map(|index| self.value_mut(index))
    }

    /// Inserts `key` and returns its value payload for the caller to fill.
    ///
    /// If the key is already present its existing payload is returned
    /// unchanged and the entry count does not move, so an insert-then-write
    /// is an idempotent upsert. Only the low 56 bits of `key` participate.
    ///
    /// # Errors
    ///
    /// Fails if the table needed to grow and the larger bucket array could
    /// not be allocated, or if the table is already at `max_bucket_count()`.
    /// The table is unchanged on failure.
    pub fn insert(&mut self, key: u64) -> Result<&mut [u8], AllocError> {
        let key = key & KEY_MASK;
        if let Some(index) = self.emplace(key) {
            return Ok(self.value_mut(index));
        }
        self.grow()?;
        match self.emplace(key) {
            Some(index) => Ok(self.value_mut(index)),
            None => Err(AllocError),
        }
    }

    /// Removes `key`, copying its payload into `out` first if provided.
    ///
    /// Returns whether the key was present. `out`, when given, must be
    /// exactly `value_size()` bytes.
    ///
    /// May shrink the table when the load factor drops below 3/8; a failed
    /// shrink allocation is ignored and the table stays valid at its current
    /// size.
    pub fn remove(&mut self, key: u64, out: Option<&mut [u8]>) -> bool {
        let key = key & KEY_MASK;
        let home = self.home(key);
        if !self.header(home).direct_hit() {
            return false;
        }

        let mut index = home;
        let mut prev: Option<usize> = None;
        loop {
            let header = self.header(index);
            if header.key() == key {
                if let Some(out) = out {
                    out.copy_from_slice(self.value(index));
                }
                let probe = header.next_probe();
                if probe == NO_MORE_PROBES {
                    // Tail of its chain: clear it and terminate the
                    // predecessor.
                    if let Some(prev) = prev {
                        let p = self.header(prev);
                        self.set_header(prev, p.with_next_probe(NO_MORE_PROBES));
                    }
                    self.clear_slot(index);
                } else {
                    // Backward-shift compaction: pull the successor forward
                    // so the chain never develops holes. Every key in the
                    // chain shares this home, so the matched bucket's
                    // direct_hit bit still describes the pulled entry.
                    let successor = self.probe_index(home, probe);
                    let s = self.header(successor);
                    self.set_header(index, Header::new(s.key(), s.next_probe(), header.direct_hit()));
                    self.copy_value(successor, index);
                    self.clear_slot(successor);
                }
                self.num_entries -= 1;
                self.maybe_shrink();
                return true;
            }
            let probe = header.next_probe();
            if probe == NO_MORE_PROBES {
                return false;
            }
            prev = Some(index);
            index = self.probe_index(home, probe);
        }
    }

    /// Places `key` without growing. Returns its bucket index, or `None` when
    /// no empty slot is reachable within the probe budget.
    fn emplace(&mut self, key: u64) -> Option<usize> {
        let home = self.home(key);
        let header = self.header(home);
        if header.is_empty() {
            self.set_header(home, Header::new(key, NO_MORE_PROBES, true));
            self.num_entries += 1;
            Some(home)
        } else if header.direct_hit() {
            self.emplace_direct(key, home)
        } else {
            self.emplace_indirect(key, home)
        }
    }

    /// The home bucket roots `key`'s own chain: walk it, and on a miss append
    /// the new entry at the first empty slot past the chain's last used probe
    /// index.
    fn emplace_direct(&mut self, key: u64, home: usize) -> Option<usize> {
        let mut probe = 0u8;
        let mut index = home;
        loop {
            let header = self.header(index);
            if header.key() == key {
                return Some(index);
            }
            let next = header.next_probe();
            if next == NO_MORE_PROBES {
                break;
            }
            probe = next;
            index = self.probe_index(home, next);
        }

        // `index` is the chain tail, sitting at probe position `probe`.
        for y in probe + 1..NO_MORE_PROBES {
            let candidate = self.probe_index(home, y);
            if self.header(candidate).is_empty() {
                self.set_header(candidate, Header::new(key, NO_MORE_PROBES, false));
                let tail = self.header(index);
                self.set_header(index, tail.with_next_probe(y));
                self.num_entries += 1;
                return Some(candidate);
            }
        }
        None
    }

    /// The home bucket is occupied by a foreign entry displaced from its own
    /// home. The new key has priority for the slot: move the foreign entry to
    /// the first empty slot reachable in *its* chain (relinked at its sorted
    /// probe position), splice its old position out, then claim the home
    /// bucket as a direct hit.
    fn emplace_indirect(&mut self, key: u64, home: usize) -> Option<usize> {
        let displaced = self.header(home);
        let foreign_home = self.home(displaced.key());

        // One walk over the foreign chain finds both the bucket whose link
        // targets `home` and the first empty slot among the chain's gaps.
        let mut pred: Option<(usize, u8)> = None;
        let mut gap: Option<(usize, u8, u8, u8)> = None;
        let mut probe = 0u8;
        loop {
            let index = self.probe_index(foreign_home, probe);
            let next = self.header(index).next_probe();
            if pred.is_none()
                && next != NO_MORE_PROBES
                && self.probe_index(foreign_home, next) == home
            {
                pred = Some((index, next));
            }
            if gap.is_none() {
                // When `next` is the terminator this scans the region past
                // the tail, up to the last usable probe index.
                for y in probe + 1..next {
                    if self.header(self.probe_index(foreign_home, y)).is_empty() {
                        gap = Some((index, probe, y, next));
                        break;
                    }
                }
            }
            if next == NO_MORE_PROBES {
                break;
            }
            probe = next;
        }

        // `pred` always exists while the chain invariant holds; treat a miss
        // like probe exhaustion so the caller rebuilds via grow.
        let (pred_index, displaced_probe) = pred?;
        let (gap_pred, gap_pred_probe, empty_probe, gap_next) = gap?;
        let empty_index = self.probe_index(foreign_home, empty_probe);

        self.copy_value(home, empty_index);
        if gap_next == displaced_probe {
            // The empty slot sits immediately before the displaced entry in
            // probe order: the copy inherits the displaced entry's links and
            // the gap predecessor doubles as its chain predecessor.
            self.set_header(
                empty_index,
                Header::new(displaced.key(), displaced.next_probe(), false),
            );
            let p = self.header(gap_pred);
            self.set_header(gap_pred, p.with_next_probe(empty_probe));
        } else if gap_pred_probe == displaced_probe {
            // The empty slot sits immediately after the displaced entry: link
            // the copy to the entry's successor and the predecessor straight
            // to the copy.
            self.set_header(empty_index, Header::new(displaced.key(), gap_next, false));
            let p = self.header(pred_index);
            self.set_header(pred_index, p.with_next_probe(empty_probe));
        } else {
            // Disjoint: insert the copy into its gap and splice the old
            // position out of the chain.
            self.set_header(empty_index, Header::new(displaced.key(), gap_next, false));
            let p = self.header(gap_pred);
            self.set_header(gap_pred, p.with_next_probe(empty_probe));
            let p = self.header(pred_index);
            self.set_header(pred_index, p.with_next_probe(displaced.next_probe()));
        }

        self.set_header(home, Header::new(key, NO_MORE_PROBES, true));
        self.num_entries += 1;
        Some(home)
    }

    #[cold]
    fn grow(&mut self) -> Result<(), AllocError> {
        let doubled = self
            .num_buckets
            .checked_mul(2)
            .filter(|&n| n <= self.max_bucket_count())
            .ok_or(AllocError)?;
        self.resize(doubled)
    }

    fn maybe_shrink(&mut self) {
        if self.num_buckets > Self::MIN_BUCKETS && self.num_entries * 8 < self.num_buckets * 3 {
            // Best effort: on failure the table is simply kept at its
            // current size.
            let _ = self.resize(self.num_buckets / 2);
        }
    }

    /// Rebuilds the table at `new_bucket_count` buckets, re-emplacing every
    /// live entry.
    ///
    /// The new table is built aside and swapped in only once every entry has
    /// moved, so any failure (allocation, or probe exhaustion when
    /// shrinking) leaves `self` untouched.
    fn resize(&mut self, new_bucket_count: usize) -> Result<(), AllocError> {
        let mut new = Self::with_buckets(new_bucket_count, self.value_size, self.bucket_size)?;
        for index in 0..self.num_buckets {
            let header = self.header(index);
            if header.is_empty() {
                continue;
            }
            let Some(slot) = new.emplace(header.key()) else {
                return Err(AllocError);
            };
            new.value_mut(slot).copy_from_slice(self.value(index));
        }
        debug_assert_eq!(new.num_entries, self.num_entries);
        core::mem::swap(self, &mut new);
        Ok(())
    }
}

impl Debug for RawTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawTable")
            .field("len", &self.num_entries)
            .field("bucket_count", &self.num_buckets)
            .field("value_size", &self.value_size)
            .field("load_factor", &self.load_factor())
            .finish()
    }
}

fn bucket_size_for(value_size: usize) -> Option<usize> {
    HEADER_SIZE
        .checked_add(value_size)?
        .checked_next_multiple_of(VALUE_ALIGN)
}

fn max_buckets_for(bucket_size: usize) -> usize {
    let max_slots = (isize::MAX as usize) / bucket_size;
    if max_slots == 0 {
        return 0;
    }
    let by_alloc = 1usize << max_slots.ilog2();
    by_alloc.min(1usize << KEY_BITS.min(usize::BITS - 1))
}
