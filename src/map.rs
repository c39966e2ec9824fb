//! Typed convenience layer over [`RawTable`].

use core::fmt::Debug;
use core::marker::PhantomData;

use bytemuck::Pod;

use crate::table::AllocError;
use crate::table::RawTable;

/// An integer-keyed map storing plain-old-data values inline in the bucket
/// arena.
///
/// `FlatMap56<V>` wraps [`RawTable`] and copies `V` in and out of the
/// untyped value payload, so `V` must be [`Pod`] with an alignment of at most
/// 8 bytes. Values are moved by `memcpy` during chain relocation and resize,
/// which is exactly what `Pod` licenses.
///
/// Keys are `u64` compared by their low 56 bits; two keys that agree in the
/// low 56 bits refer to the same entry.
///
/// ## Example
///
/// ```rust
/// use flatmap56::FlatMap56;
///
/// let mut map: FlatMap56<u64> = FlatMap56::new().unwrap();
/// assert_eq!(map.insert(1, 100).unwrap(), None);
/// assert_eq!(map.insert(1, 101).unwrap(), Some(100));
/// assert_eq!(map.get(1), Some(&101));
/// assert_eq!(map.remove(1), Some(101));
/// assert!(map.is_empty());
/// ```
pub struct FlatMap56<V> {
    raw: RawTable,
    _marker: PhantomData<V>,
}

impl<V: Pod> FlatMap56<V> {
    /// Creates an empty map at the minimum bucket count.
    ///
    /// # Errors
    ///
    /// Fails if the bucket array cannot be allocated.
    ///
    /// # Panics
    ///
    /// Panics if `align_of::<V>() > 8`; value payloads are 8-aligned within
    /// the arena.
    pub fn new() -> Result<Self, AllocError> {
        Self::with_capacity(0)
    }

    /// Creates an empty map with at least `capacity` buckets (clamped and
    /// rounded as in [`RawTable::with_capacity`]).
    ///
    /// # Errors
    ///
    /// Fails if the bucket array cannot be allocated.
    ///
    /// # Panics
    ///
    /// Panics if `align_of::<V>() > 8`.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        assert!(
            core::mem::align_of::<V>() <= 8,
            "FlatMap56 values must have an alignment of at most 8 bytes",
        );
        Ok(FlatMap56 {
            raw: RawTable::with_capacity(capacity, core::mem::size_of::<V>())?,
            _marker: PhantomData,
        })
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the current bucket count.
    pub fn bucket_count(&self) -> usize {
        self.raw.bucket_count()
    }

    /// Returns `len() / bucket_count()`.
    pub fn load_factor(&self) -> f32 {
        self.raw.load_factor()
    }

    /// Returns a reference to the value stored for `key`.
    pub fn get(&self, key: u64) -> Option<&V> {
        self.raw.get(key).map(bytemuck::from_bytes)
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: u64) -> Option<&mut V> {
        self.raw.get_mut(key).map(bytemuck::from_bytes_mut)
    }

    /// Inserts `key` with `value`, returning the previous value if the key
    /// was already present.
    ///
    /// # Errors
    ///
    /// Fails if the table needed to grow and could not; the map is unchanged
    /// in that case.
    pub fn insert(&mut self, key: u64, value: V) -> Result<Option<V>, AllocError> {
        let previous = self.get(key).copied();
        let slot = self.raw.insert(key)?;
        slot.copy_from_slice(bytemuck::bytes_of(&value));
        Ok(previous)
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: u64) -> Option<V> {
        let mut value = V::zeroed();
        self.raw
            .remove(key, Some(bytemuck::bytes_of_mut(&mut value)))
            .then_some(value)
    }

    /// Borrows the underlying untyped table.
    pub fn raw(&self) -> &RawTable {
        &self.raw
    }
}

impl<V: Pod + Debug> Debug for FlatMap56<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatMap56")
            .field("len", &self.len())
            .field("bucket_count", &self.bucket_count())
            .finish()
    }
}
