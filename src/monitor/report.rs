//! The monitoring report, persisted as json and echoed on stdout.

use serde::{Deserialize, Serialize};

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::Path;

pub const MIB: f64 = 1024. * 1024.;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    /// wall time of the monitored phase
    #[serde(rename = "time (hrs)")]
    pub time_hours: f64,
    /// max of host bytes allocated above the start of the monitored phase
    #[serde(rename = "peak CPU memory (MiB)")]
    pub peak_host_mib: f64,
    /// device peak minus device baseline, can be negative
    #[serde(rename = "peak GPU memory (MiB)")]
    pub peak_device_delta_mib: i64,
    /// process cpu time of the monitored phase
    #[serde(rename = "cpu time (hrs)")]
    pub cpu_time_hours: f64,
}

impl MonitoringReport {
    /// device delta in MiB, truncated toward 0
    pub fn device_delta_mib(baseline: u64, peak: u64) -> i64 {
        (peak as i64 - baseline as i64) / (1024 * 1024)
    }

    /// dumps the report as json, creating the directory
    pub fn dump(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self)?;
        log::info!("monitoring report dumped in {}", path.display());
        Ok(())
    }

    pub fn reload(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
} // end of impl MonitoringReport

impl std::fmt::Display for MonitoringReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time (hrs) : {:.4e}, peak CPU memory (MiB) : {:.3}, peak GPU memory (MiB) : {}, cpu time (hrs) : {:.4e}",
            self.time_hours, self.peak_host_mib, self.peak_device_delta_mib, self.cpu_time_hours
        )
    }
}

// end of mod tests
