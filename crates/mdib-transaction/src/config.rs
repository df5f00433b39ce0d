//! MDIB configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`Mdib`](crate::Mdib).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdibConfig {
    /// Sequence id of the MDIB; a fresh one is generated when unset.
    pub sequence_id: Option<String>,
    /// Instance id reported in every version group.
    pub instance_id: Option<u64>,
    /// Stamp metric and alert condition determination times on commit.
    pub set_determination_time: bool,
    /// Give every created single-state descriptor a default state.
    pub create_missing_states: bool,
    /// Buffer size of the notification channel.
    pub notification_capacity: usize,
}

impl Default for MdibConfig {
    fn default() -> Self {
        Self {
            sequence_id: None,
            instance_id: None,
            set_determination_time: true,
            create_missing_states: true,
            notification_capacity: 256,
        }
    }
}

/// Builder for MDIB configuration.
pub struct MdibConfigBuilder {
    config: MdibConfig,
}

impl MdibConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MdibConfig::default(),
        }
    }

    pub fn sequence_id(mut self, sequence_id: impl Into<String>) -> Self {
        self.config.sequence_id = Some(sequence_id.into());
        self
    }

    pub fn instance_id(mut self, instance_id: u64) -> Self {
        self.config.instance_id = Some(instance_id);
        self
    }

    pub fn set_determination_time(mut self, enabled: bool) -> Self {
        self.config.set_determination_time = enabled;
        self
    }

    pub fn create_missing_states(mut self, enabled: bool) -> Self {
        self.config.create_missing_states = enabled;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> MdibConfig {
        self.config
    }
}

impl Default for MdibConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
