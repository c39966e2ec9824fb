//! Geometric probe-sequence generation.
//!
//! For a table of `2^bits` buckets, the candidate bucket for home hash `h` at
//! probe step `p` is `(h + probes[p]) & table_mask`. The offsets
//! `probes[1..=126]` form a strictly increasing sequence built by repeated
//! multiplication with a per-size-class growth ratio and rounding up, so
//! successive probe distances grow geometrically instead of linearly. A fixed
//! budget of 126 usable steps has to stay effective from 128 buckets up to the
//! maximum table size: small tables use ratios barely above 1 (near-linear
//! probing), large tables use ratios approaching sqrt(2) so the cumulative
//! distance at step 126 is still on the order of the bucket count.
//!
//! `probes[0]` and `probes[127]` are reserved sentinels (empty slot and chain
//! terminator respectively) and always forced to zero.

use crate::bucket::MAX_PROBES;

/// Growth ratios for table sizes `2^7` through `2^64`, indexed by `bits - 7`.
///
/// Each ratio is the largest six-decimal value whose geometric sequence,
/// starting at 1 and rounding up at every step, stays below the table size
/// after 126 steps.
#[rustfmt::skip]
const COMMON_RATIOS: [f32; 58] = [
    1.0079365, 1.0170454, 1.02521,   1.0327868, 1.04,       1.0470588, 1.0537634, 1.0603975,
    1.0670611, 1.0736196, 1.0802047, 1.0866873, 1.0935134,  1.1,       1.1066263, 1.1126557,
    1.1193954, 1.1253822, 1.1328775, 1.1396684, 1.1458784,  1.1526062, 1.1588525, 1.1663471,
    1.1723212, 1.1795865, 1.186137,  1.1934365, 1.2,        1.2067335, 1.2141206, 1.2210136,
    1.2275452, 1.2347129, 1.2421652, 1.25,      1.2552301,  1.2626262, 1.2698558, 1.2763086,
    1.2839322, 1.2919024, 1.2993667, 1.306582,  1.3143861,  1.3224209, 1.3304347, 1.3353751,
    1.3431294, 1.3509286, 1.358213,  1.3660651, 1.374269,   1.3826252, 1.3905559, 1.398671,
    1.4048699, 1.4124077,
];

/// Integer ceiling of a non-negative product, avoiding `f64::ceil` so the
/// crate builds without `std` (or `libm`).
#[inline(always)]
fn ceil_to_u64(x: f64) -> u64 {
    let truncated = x as u64;
    if (truncated as f64) < x {
        truncated + 1
    } else {
        truncated
    }
}

/// Builds the probe-offset table for a table of `2^bits` buckets.
///
/// `bits` must be in `7..=64`. Offsets start at `probes[1] == 1` and each
/// subsequent offset is `ceil(previous * ratio)`, which is strictly larger
/// than the previous one for any ratio above 1.
pub(crate) fn build_probes(bits: u32) -> [u64; MAX_PROBES] {
    debug_assert!((7..=64).contains(&bits));
    let ratio = COMMON_RATIOS[(bits - 7) as usize] as f64;

    let mut probes = [0u64; MAX_PROBES];
    let mut offset = 1u64;
    probes[1] = offset;
    // Each offset is computed only once a slot remains to hold it: at the
    // largest size class one multiplication past probes[126] leaves u64
    // range.
    for slot in probes.iter_mut().take(MAX_PROBES - 1).skip(2) {
        offset = ceil_to_u64(offset as f64 * ratio);
        *slot = offset;
    }
    // probes[0] (empty sentinel) and probes[127] (chain terminator) stay 0.
    probes
}
