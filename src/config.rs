//! Runtime knobs for a pipeline session.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, Result};

// Defaults mirror a small restaurant demo: two seconds per order.
const DEFAULT_CHANNEL_DIR: &str = "/tmp";
const DEFAULT_INBOUND_NAME: &str = "order_pipeline_to_kitchen";
const DEFAULT_OUTBOUND_NAME: &str = "order_pipeline_from_kitchen";
const DEFAULT_PREP_MS: u64 = 2000;
const DEFAULT_POLL_MS: u64 = 100;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Directory holding both FIFOs.
    pub channel_dir: PathBuf,
    /// Front desk -> kitchen FIFO name.
    pub inbound_name: String,
    /// Kitchen -> front desk FIFO name.
    pub outbound_name: String,
    /// Simulated preparation time per order.
    pub prep_duration: Duration,
    /// Granularity of interruptible waits.
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_dir: PathBuf::from(DEFAULT_CHANNEL_DIR),
            inbound_name: DEFAULT_INBOUND_NAME.to_string(),
            outbound_name: DEFAULT_OUTBOUND_NAME.to_string(),
            prep_duration: Duration::from_millis(DEFAULT_PREP_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl PipelineConfig {
    pub fn inbound_path(&self) -> PathBuf {
        self.channel_dir.join(&self.inbound_name)
    }

    pub fn outbound_path(&self) -> PathBuf {
        self.channel_dir.join(&self.outbound_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(PipelineError::Config("poll interval must be > 0".to_string()));
        }
        for name in [&self.inbound_name, &self.outbound_name] {
            if name.is_empty() || name.contains('/') {
                return Err(PipelineError::Config(format!(
                    "channel name must be a plain file name: {name:?}"
                )));
            }
        }
        if self.inbound_name == self.outbound_name {
            return Err(PipelineError::Config(
                "inbound and outbound channels need distinct names".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().expect("defaults valid");
        assert_ne!(config.inbound_path(), config.outbound_path());
        assert_eq!(config.prep_duration, Duration::from_secs(2));
    }

    #[test]
    fn rejects_shared_channel_name() {
        let config = PipelineConfig {
            outbound_name: DEFAULT_INBOUND_NAME.to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn rejects_nested_names_and_zero_poll() {
        let nested = PipelineConfig {
            inbound_name: "a/b".to_string(),
            ..PipelineConfig::default()
        };
        assert!(nested.validate().is_err());

        let zero_poll = PipelineConfig {
            poll_interval: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(zero_poll.validate().is_err());
    }
}
