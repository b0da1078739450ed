//! Device (gpu) memory readings.
//!
//! Readings go through [DeviceMemoryProbe] so that the monitor can run without any device,
//! with [NoDevice] reporting 0. With the feature `nvml` an [NvmlProbe] reads the memory used
//! on a device. NVML has no peak counter, the probe keeps the max of its readings.

/// Byte counters of a device.
pub trait DeviceMemoryProbe {
    /// name for logs
    fn get_name(&self) -> String;
    /// restarts the peak from the current allocation
    fn reset_peak_stats(&mut self) -> anyhow::Result<()>;
    /// bytes currently allocated
    fn memory_allocated(&mut self) -> anyhow::Result<u64>;
    /// max bytes allocated since last reset
    fn max_memory_allocated(&mut self) -> anyhow::Result<u64>;
}

/// no device, all counters at 0
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDevice;

impl DeviceMemoryProbe for NoDevice {
    fn get_name(&self) -> String {
        String::from("no device")
    }

    fn reset_peak_stats(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn memory_allocated(&mut self) -> anyhow::Result<u64> {
        Ok(0)
    }

    fn max_memory_allocated(&mut self) -> anyhow::Result<u64> {
        Ok(0)
    }
}

#[cfg(feature = "nvml")]
pub use self::nvml_probe::NvmlProbe;

#[cfg(feature = "nvml")]
mod nvml_probe {

    use nvml_wrapper::Nvml;

    use super::DeviceMemoryProbe;

    pub struct NvmlProbe {
        nvml: Nvml,
        device_index: u32,
        peak: u64,
    }

    impl NvmlProbe {
        pub fn new(device_index: u32) -> anyhow::Result<Self> {
            let nvml = Nvml::init()?;
            log::info!("NVML initialized, reading memory of device {}", device_index);
            Ok(NvmlProbe { nvml, device_index, peak: 0 })
        }

        fn read_used(&self) -> anyhow::Result<u64> {
            let device = self.nvml.device_by_index(self.device_index)?;
            Ok(device.memory_info()?.used)
        }
    }

    impl DeviceMemoryProbe for NvmlProbe {
        fn get_name(&self) -> String {
            format!("nvml device {}", self.device_index)
        }

        fn reset_peak_stats(&mut self) -> anyhow::Result<()> {
            self.peak = self.read_used()?;
            Ok(())
        }

        fn memory_allocated(&mut self) -> anyhow::Result<u64> {
            let used = self.read_used()?;
            self.peak = self.peak.max(used);
            Ok(used)
        }

        fn max_memory_allocated(&mut self) -> anyhow::Result<u64> {
            let used = self.read_used()?;
            self.peak = self.peak.max(used);
            Ok(self.peak)
        }
    }
} // end of mod nvml_probe

/// the probe of the build : NVML on device 0 if the feature is on and a device answers, else [NoDevice]
pub fn get_default_probe() -> Box<dyn DeviceMemoryProbe> {
    #[cfg(feature = "nvml")]
    {
        match NvmlProbe::new(0) {
            Ok(probe) => return Box::new(probe),
            Err(e) => log::warn!("NVML unavailable ({}), device memory reported as 0", e),
        }
    }
    Box::new(NoDevice)
}
