//! Environment configuration, read once into process statics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static INIT: Once = Once::new();
static DISABLED: AtomicBool = AtomicBool::new(false);

/// Kill-switch: when `TIERPOOL_DISABLE` is set, every request routes to
/// the host allocator instead of the pool.
///
/// The variable is read exactly once. The answer never changes for the
/// life of the process, so any pointer's provenance (pool vs host) stays
/// consistent between `allocate` and `deallocate`.
pub fn pool_disabled() -> bool {
    INIT.call_once(|| {
        if std::env::var_os("TIERPOOL_DISABLE").is_some() {
            DISABLED.store(true, Ordering::Relaxed);
        }
    });
    DISABLED.load(Ordering::Relaxed)
}
