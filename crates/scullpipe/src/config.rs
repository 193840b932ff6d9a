use crate::error::ConfigError;

/// Default number of pipe devices.
pub const DEFAULT_DEVICE_COUNT: usize = 4;
/// Default per-device buffer size in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4000;

/// Sizing configuration for a [`ChannelTable`](crate::ChannelTable).
///
/// Read once when the table is built. Later edits to a `Config` value have no
/// effect on tables or buffers that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Number of independent channels (default: 4)
    pub device_count: usize,
    /// Bytes per ring buffer, one of which is always kept free (default: 4000)
    pub buffer_capacity: usize,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(device_count: usize, buffer_capacity: usize, enable_metrics: bool) -> Self {
        Self {
            device_count,
            buffer_capacity,
            enable_metrics,
        }
    }

    /// Number of payload bytes a full buffer holds.
    #[inline]
    pub const fn usable_capacity(&self) -> usize {
        self.buffer_capacity.saturating_sub(1)
    }

    /// Sets the number of channels.
    pub fn with_device_count(mut self, count: usize) -> Self {
        self.device_count = count;
        self
    }

    /// Sets the ring buffer capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Enables or disables metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Checks that the sizing can back at least one usable channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_count == 0 {
            return Err(ConfigError::NoDevices);
        }
        if self.buffer_capacity < 2 {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.buffer_capacity,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_count: DEFAULT_DEVICE_COUNT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            enable_metrics: false,
        }
    }
}

/// Single tiny channel, handy for exercising wrap-around and blocking paths
pub const SMALL_CONFIG: Config = Config::new(1, 64, true);

/// Four 64 KiB channels for bulk transfer
pub const LARGE_CONFIG: Config = Config::new(4, 64 * 1024, false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_classic_sizing() {
        let config = Config::default();
        assert_eq!(config.device_count, 4);
        assert_eq!(config.buffer_capacity, 4000);
        assert_eq!(config.usable_capacity(), 3999);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_sizes() {
        assert_eq!(
            Config::default().with_device_count(0).validate(),
            Err(ConfigError::NoDevices)
        );
        assert_eq!(
            Config::default().with_buffer_capacity(1).validate(),
            Err(ConfigError::CapacityTooSmall { capacity: 1 })
        );
        assert!(Config::default().with_buffer_capacity(2).validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(SMALL_CONFIG.validate().is_ok());
        assert!(LARGE_CONFIG.validate().is_ok());
    }
}
