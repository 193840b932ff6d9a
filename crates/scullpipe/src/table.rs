use crate::handle::{AccessMode, Handle, OpenOptions};
use crate::{Channel, ChannelStatus, Config, ConfigError, PipeError};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Fixed set of independent channels, one per configured device index.
///
/// Channels live as long as the table; only their buffers come and go with
/// open handles. Each channel has its own lock, so traffic on one index never
/// contends with another.
#[derive(Debug)]
pub struct ChannelTable {
    config: Config,
    channels: Vec<Arc<Channel>>,
}

impl ChannelTable {
    /// Builds `config.device_count` unallocated channels.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let channels = (0..config.device_count)
            .map(|index| Channel::new(index, &config))
            .collect();

        info!(
            devices = config.device_count,
            capacity = config.buffer_capacity,
            metrics = config.enable_metrics,
            "channel table created"
        );

        Ok(Self { config, channels })
    }

    /// The sizing this table was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of channels.
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false; a table has at least one channel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Looks up a channel, failing with [`PipeError::NotFound`] out of range.
    pub fn channel(&self, index: usize) -> Result<&Arc<Channel>, PipeError> {
        self.channels.get(index).ok_or(PipeError::NotFound {
            index,
            count: self.channels.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels.iter()
    }

    /// Opens a blocking handle on channel `index`.
    pub fn open(&self, index: usize, mode: AccessMode) -> Result<Handle, PipeError> {
        self.channel(index)?.open(mode)
    }

    /// Opens a handle on channel `index` with explicit options.
    pub fn open_with(&self, index: usize, options: OpenOptions) -> Result<Handle, PipeError> {
        self.channel(index)?.open_with(options)
    }

    /// Status of every channel, in index order.
    pub fn status(&self) -> Vec<ChannelStatus> {
        self.channels.iter().map(|c| c.status()).collect()
    }
}

impl fmt::Display for ChannelTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} devices, buffer size {}",
            self.channels.len(),
            self.config.buffer_capacity
        )?;
        for status in self.status() {
            write!(f, "\n{status}")?;
        }
        Ok(())
    }
}
