//! Time and memory monitoring of the compute phase of a study.
//!
//! [ResourceMonitor::start] records wall and cpu clocks, resets the device peak, reads the device
//! baseline and starts host allocation tracing. [ResourceMonitor::stop] consumes the monitor so
//! that a run is stopped at most once, and builds the [MonitoringReport]. A failure in between
//! drops the monitor without report.

use std::time::SystemTime;

use cpu_time::ProcessTime;

pub mod alloc;
pub mod device;
pub mod report;

use device::DeviceMemoryProbe;
use report::{MonitoringReport, MIB};

const SECONDS_BY_HOUR: f64 = 3600.;

pub struct ResourceMonitor<'a> {
    probe: &'a mut dyn DeviceMemoryProbe,
    sys_start: SystemTime,
    cpu_start: ProcessTime,
    /// device bytes allocated at start
    device_baseline: u64,
}

impl<'a> ResourceMonitor<'a> {
    pub fn start(probe: &'a mut dyn DeviceMemoryProbe) -> anyhow::Result<Self> {
        log::info!("starting resource monitoring, device : {}", probe.get_name());
        let sys_start = SystemTime::now();
        let cpu_start = ProcessTime::now();
        probe.reset_peak_stats()?;
        let device_baseline = probe.memory_allocated()?;
        alloc::start_tracing();
        Ok(ResourceMonitor { probe, sys_start, cpu_start, device_baseline })
    }

    pub fn get_device_baseline(&self) -> u64 {
        self.device_baseline
    }

    pub fn stop(self) -> anyhow::Result<MonitoringReport> {
        let elapsed = self.sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.);
        let cpu = self.cpu_start.elapsed().as_secs_f64();
        let traced = alloc::stop_tracing();
        let device_peak = self.probe.max_memory_allocated()?;
        let report = MonitoringReport {
            time_hours: elapsed / SECONDS_BY_HOUR,
            peak_host_mib: traced.peak as f64 / MIB,
            peak_device_delta_mib: MonitoringReport::device_delta_mib(self.device_baseline, device_peak),
            cpu_time_hours: cpu / SECONDS_BY_HOUR,
        };
        log::info!(
            "monitoring stopped, sys time(s) {:.2e} cpu time(s) {:.2e}, host peak {} bytes, device baseline {} peak {}",
            elapsed, cpu, traced.peak, self.device_baseline, device_peak
        );
        Ok(report)
    } // end of stop
} // end of impl ResourceMonitor

// end of mod tests
