//! OS page provider: anonymous, zero-initialized, page-aligned mappings.
//!
//! Spans obtained here are never returned to the OS; the process holds
//! them until exit.

#[cfg(unix)]
pub mod unix;
#[cfg(unix)]
pub use unix as sys;

/// Map `size` bytes of anonymous read-write memory. Returns null on
/// failure. The region is page-aligned and zero-filled by the kernel.
///
/// # Safety
/// `size` must be page-aligned and non-zero.
#[inline]
pub unsafe fn map_anonymous(size: usize) -> *mut u8 {
    sys::map_anonymous(size)
}
