//! The "local native OpenCL driver" is an external collaborator (spec.md
//! §1 Non-goals); this crate only specifies the interface a daemon needs
//! from it. `SimDriver` is a stand-in that keeps `dcld` runnable end to
//! end without an ICD present — it reports a handful of fabricated
//! devices and always reports successful builds.

use dcl_wire::messages::DeviceId;

#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: DeviceId,
    pub name: String,
    pub compute_units: u32,
}

/// The subset of driver functionality this runtime's request processor
/// needs: device enumeration/info and program build. Buffer storage and
/// kernel argument binding are handled node-side in-memory
/// (`crate::resources`) since the spec's scenarios never depend on a real
/// GPU executing anything — only on the runtime's own bookkeeping.
pub trait NativeDriver: Send + Sync {
    fn devices(&self) -> &[SimulatedDevice];

    fn device_info(&self, device: DeviceId, param: u32) -> Option<Vec<u8>> {
        let device = self.devices().iter().find(|d| d.id == device)?;
        Some(match param {
            0 => device.name.clone().into_bytes(),
            1 => device.compute_units.to_le_bytes().to_vec(),
            _ => Vec::new(),
        })
    }

    /// Compiles `source` for `devices`. The simulated driver always
    /// succeeds; a real driver would invoke the vendor compiler here.
    fn build(&self, source: &str, devices: &[DeviceId], options: &str) -> BuildOutcome;
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub succeeded: bool,
    pub log: String,
}

pub struct SimDriver {
    devices: Vec<SimulatedDevice>,
}

impl SimDriver {
    pub fn new() -> Self {
        let cpus = num_cpus::get() as u32;
        SimDriver {
            devices: vec![SimulatedDevice {
                id: 1,
                name: format!("dcl simulated device ({} cores)", cpus),
                compute_units: cpus,
            }],
        }
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeDriver for SimDriver {
    fn devices(&self) -> &[SimulatedDevice] {
        &self.devices
    }

    fn build(&self, source: &str, _devices: &[DeviceId], _options: &str) -> BuildOutcome {
        if source.trim().is_empty() {
            BuildOutcome { succeeded: false, log: "empty program source".to_string() }
        } else {
            BuildOutcome { succeeded: true, log: String::new() }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sim_driver_reports_at_least_one_device() {
        let driver = SimDriver::new();
        assert!(!driver.devices().is_empty());
    }

    #[test]
    fn empty_source_fails_the_build() {
        let driver = SimDriver::new();
        let outcome = driver.build("", &[1], "");
        assert!(!outcome.succeeded);
    }

    #[test]
    fn non_empty_source_builds_successfully() {
        let driver = SimDriver::new();
        let outcome = driver.build("kernel void k() {}", &[1], "");
        assert!(outcome.succeeded);
    }
}
