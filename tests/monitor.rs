//! Host memory tracing with the tracking allocator installed.

use netcluster::prelude::*;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[test]
fn host_peak_sees_allocation() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut probe = NoDevice;
    let monitor = ResourceMonitor::start(&mut probe).unwrap();
    {
        let block = vec![1u8; 16 * 1024 * 1024];
        std::hint::black_box(&block);
    }
    let report = monitor.stop().unwrap();
    assert!(report.peak_host_mib >= 16., "peak {}", report.peak_host_mib);
    assert_eq!(report.peak_device_delta_mib, 0);
} // end of host_peak_sees_allocation
