//! Size-class scheme shared by all three tiers.
//!
//! Classes are linear multiples of [`ALIGNMENT`]: class `i` holds blocks of
//! exactly `(i + 1) * ALIGNMENT` bytes, from 8 bytes up to [`MAX_BYTES`].
//! The mapping is static and stateless; only the batch heuristic below
//! carries any policy.

use crate::util::{ALIGNMENT, MAX_BYTES};

/// Number of size classes (one per `ALIGNMENT` step up to `MAX_BYTES`).
pub const CLASS_COUNT: usize = MAX_BYTES / ALIGNMENT;

/// Round `bytes` up to the next multiple of `ALIGNMENT`.
#[inline(always)]
pub const fn round_up(bytes: usize) -> usize {
    (bytes + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Map a request size to its class index.
///
/// Callers must have bounded `bytes` to `MAX_BYTES`; sizes below the
/// alignment floor land in class 0.
#[inline(always)]
pub fn class_index(bytes: usize) -> usize {
    debug_assert!(bytes <= MAX_BYTES);
    let bytes = if bytes < ALIGNMENT { ALIGNMENT } else { bytes };
    (bytes + ALIGNMENT - 1) / ALIGNMENT - 1
}

/// Block size for a class index.
#[inline(always)]
pub const fn class_size(index: usize) -> usize {
    (index + 1) * ALIGNMENT
}

/// How many blocks of `size` bytes the thread cache requests from the
/// central cache in one refill.
///
/// Small classes move in large batches to amortize the spinlock; the batch
/// is capped so one transfer never exceeds 4 KiB of payload, and is always
/// at least one block.
pub fn batch_count(size: usize) -> usize {
    const MAX_BATCH_BYTES: usize = 4 * 1024;

    let base = if size <= 32 {
        64
    } else if size <= 64 {
        32
    } else if size <= 128 {
        16
    } else if size <= 256 {
        8
    } else if size <= 512 {
        4
    } else if size <= 1024 {
        2
    } else {
        1
    };

    let cap = (MAX_BATCH_BYTES / size).max(1);
    base.min(cap).max(1)
}
