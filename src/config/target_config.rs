use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::{
    DEFAULT_TARGET_CHARACTERISTIC_UUID, DEFAULT_TARGET_DEVICE_NAME, DEFAULT_TARGET_SERVICE_UUID,
    SelectionPolicy,
};
use crate::error::ConfigError;

/// Which peripheral, service and characteristic the bridge listens to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Advertised name of the peripheral, matched case-sensitively
    pub device_name: String,
    /// Service carrying the button state
    pub service_uuid: String,
    /// Characteristic whose first byte is the button mask
    pub characteristic_uuid: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_TARGET_DEVICE_NAME.to_string(),
            service_uuid: DEFAULT_TARGET_SERVICE_UUID.to_string(),
            characteristic_uuid: DEFAULT_TARGET_CHARACTERISTIC_UUID.to_string(),
        }
    }
}

impl TargetConfig {
    /// Rewrites both UUIDs in lower-case braced form
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        self.service_uuid = braced("target.service_uuid", &self.service_uuid)?;
        self.characteristic_uuid = braced("target.characteristic_uuid", &self.characteristic_uuid)?;
        Ok(())
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy::new(self.device_name.clone(), self.service_uuid.clone())
    }

    pub fn characteristic(&self) -> Result<Uuid, ConfigError> {
        parse("target.characteristic_uuid", &self.characteristic_uuid)
    }
}

fn parse(field: &'static str, value: &str) -> Result<Uuid, ConfigError> {
    Uuid::parse_str(value.trim()).map_err(|_| ConfigError::InvalidUuid {
        field,
        value: value.to_string(),
    })
}

fn braced(field: &'static str, value: &str) -> Result<String, ConfigError> {
    parse(field, value).map(|uuid| uuid.braced().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_uuid_spelling() {
        let mut config = TargetConfig {
            device_name: "M5StickC".into(),
            service_uuid: "1ED42829-CD7A-44E6-87DB-24FED6422BC4".into(),
            characteristic_uuid: "{503423D1-AD1F-4ED3-B3DF-06E276798FBA}".into(),
        };
        config.normalize().unwrap();

        assert_eq!(config.service_uuid, "{1ed42829-cd7a-44e6-87db-24fed6422bc4}");
        assert_eq!(
            config.characteristic_uuid,
            "{503423d1-ad1f-4ed3-b3df-06e276798fba}"
        );
    }

    #[test]
    fn rejects_garbage_uuid() {
        let mut config = TargetConfig {
            service_uuid: "not-a-uuid".into(),
            ..TargetConfig::default()
        };

        assert!(matches!(
            config.normalize(),
            Err(ConfigError::InvalidUuid { field: "target.service_uuid", .. })
        ));
    }
}
