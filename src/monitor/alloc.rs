//! Host memory accounting through the global allocator.
//!
//! [TrackingAllocator] forwards to the system allocator and keeps the number of live bytes.
//! While tracing is on, it also keeps the maximum reached. Figures are relative to the live
//! bytes at [start_tracing].
//! Without `#[global_allocator] static GLOBAL: TrackingAllocator = TrackingAllocator;` in the
//! binary nothing is counted and every figure is 0.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static BASELINE: AtomicUsize = AtomicUsize::new(0);
static TRACING: AtomicBool = AtomicBool::new(false);

pub struct TrackingAllocator;

#[inline]
fn record_alloc(size: usize) {
    let current = CURRENT.fetch_add(size, Ordering::Relaxed) + size;
    if TRACING.load(Ordering::Relaxed) {
        PEAK.fetch_max(current, Ordering::Relaxed);
    }
}

#[inline]
fn record_dealloc(size: usize) {
    CURRENT.fetch_sub(size, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
} // end of impl GlobalAlloc for TrackingAllocator

/// what tracing saw, in bytes relative to the start of tracing
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TracedMemory {
    /// live bytes at stop minus live bytes at start, can be negative
    pub current: i64,
    /// maximum of live bytes during tracing minus live bytes at start
    pub peak: u64,
}

/// starts tracing, the peak is reset to the live bytes
pub fn start_tracing() {
    let current = CURRENT.load(Ordering::Relaxed);
    BASELINE.store(current, Ordering::Relaxed);
    PEAK.store(current, Ordering::Relaxed);
    TRACING.store(true, Ordering::Relaxed);
}

/// stops tracing and returns current and peak figures
pub fn stop_tracing() -> TracedMemory {
    TRACING.store(false, Ordering::Relaxed);
    let baseline = BASELINE.load(Ordering::Relaxed);
    let current = CURRENT.load(Ordering::Relaxed);
    let peak = PEAK.load(Ordering::Relaxed);
    TracedMemory {
        current: current as i64 - baseline as i64,
        peak: peak.saturating_sub(baseline) as u64,
    }
}

pub fn is_tracing() -> bool {
    TRACING.load(Ordering::Relaxed)
}

/// live bytes seen by the allocator
pub fn get_allocated() -> usize {
    CURRENT.load(Ordering::Relaxed)
}
