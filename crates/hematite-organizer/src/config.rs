//! Configuration types for chain organization.

use serde::Deserialize;

/// Runtime configuration for the organizer.
#[derive(Clone, Debug, Deserialize)]
pub struct OrganizerConfig {
    /// Validation worker threads (0 = all hardware threads).
    pub cores: usize,

    /// Request a dedicated validation pool for CPU-bound work. The flag
    /// selects pool dedication; OS scheduling priority is left alone.
    pub priority: bool,

    /// Flush the store on every reorganization instead of holding a
    /// session-wide flush lock between start and stop. Per-reorg
    /// flushing is durable at the cost of throughput.
    pub flush_reorganizations: bool,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            cores: 0,
            priority: false,
            flush_reorganizations: false,
        }
    }
}

impl OrganizerConfig {
    /// Worker-count policy: zero means every hardware thread, anything
    /// else is clamped to the hardware.
    pub fn validation_cores(&self) -> usize {
        let hardware = num_cpus::get().max(1);
        if self.cores == 0 {
            hardware
        } else {
            self.cores.min(hardware)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OrganizerConfig::default();
        assert_eq!(config.cores, 0);
        assert!(!config.priority);
        assert!(!config.flush_reorganizations);
    }

    #[test]
    fn test_validation_cores_auto() {
        let config = OrganizerConfig::default();
        assert_eq!(config.validation_cores(), num_cpus::get().max(1));
    }

    #[test]
    fn test_validation_cores_clamped() {
        let config = OrganizerConfig {
            cores: usize::MAX,
            ..OrganizerConfig::default()
        };
        assert_eq!(config.validation_cores(), num_cpus::get().max(1));

        let config = OrganizerConfig {
            cores: 1,
            ..OrganizerConfig::default()
        };
        assert_eq!(config.validation_cores(), 1);
    }
}
