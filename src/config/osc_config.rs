use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Publishes the level of `bit` under `address` whenever the bit changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscBinding {
    pub bit: u8,
    pub address: String,
}

/// Where and what the OSC transmitter sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    /// Local address the UDP socket binds to
    pub bind_addr: String,
    /// Receiver of the OSC messages
    pub target: String,
    pub bindings: Vec<OscBinding>,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            target: "127.0.0.1:9000".to_string(),
            bindings: vec![OscBinding {
                bit: 0,
                address: "/input/Jump".to_string(),
            }],
        }
    }
}

impl OscConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_socket_addr()?;
        self.target_socket_addr()?;
        if let Some(binding) = self.bindings.iter().find(|b| b.bit > 7) {
            return Err(ConfigError::InvalidBit {
                address: binding.address.clone(),
                bit: binding.bit,
            });
        }
        Ok(())
    }

    pub fn bind_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("osc.bind_addr", &self.bind_addr)
    }

    pub fn target_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("osc.target", &self.target)
    }
}

fn socket_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_jump_to_bit_zero() {
        let config = OscConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.bindings.len(), 1);
        assert_eq!(config.bindings[0].bit, 0);
        assert_eq!(config.bindings[0].address, "/input/Jump");
    }

    #[test]
    fn rejects_bits_past_the_mask() {
        let config = OscConfig {
            bindings: vec![OscBinding {
                bit: 8,
                address: "/input/Run".into(),
            }],
            ..OscConfig::default()
        };

        assert!(matches!(config.validate(), Err(ConfigError::InvalidBit { bit: 8, .. })));
    }

    #[test]
    fn rejects_unparsable_target() {
        let config = OscConfig {
            target: "localhost".into(),
            ..OscConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { field: "osc.target", .. })
        ));
    }
}
