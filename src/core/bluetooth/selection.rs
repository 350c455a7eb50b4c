//! Picks the device or service to use out of whatever the radio reported.

use crate::core::bluetooth::device::DeviceRecord;
use crate::core::bluetooth::types::ServiceRecord;

/// How a label is compared with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    IgnoreAsciiCase,
}

impl MatchRule {
    fn matches(self, label: &str, target: &str) -> bool {
        match self {
            Self::Exact => label == target,
            Self::IgnoreAsciiCase => label.eq_ignore_ascii_case(target),
        }
    }
}

/// Returns the index of the first label matching `target`
pub fn select_index<'a, I>(labels: I, target: &str, rule: MatchRule) -> Option<usize>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    labels
        .into_iter()
        .find(|(_, label)| rule.matches(label, target))
        .map(|(index, _)| index)
}

/// Target device name and service UUID to auto-select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub device_name: String,
    pub service_uuid: String,
}

impl SelectionPolicy {
    pub fn new(device_name: impl Into<String>, service_uuid: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            service_uuid: service_uuid.into(),
        }
    }

    /// Device names compare case-sensitively
    pub fn pick_device(&self, devices: &[DeviceRecord]) -> Option<usize> {
        select_index(
            devices.iter().enumerate().map(|(i, d)| (i, d.name.as_str())),
            &self.device_name,
            MatchRule::Exact,
        )
    }

    /// Service UUIDs compare case-insensitively in braced form
    pub fn pick_service(&self, services: &[ServiceRecord]) -> Option<usize> {
        let labels: Vec<String> = services.iter().map(ServiceRecord::label).collect();
        select_index(
            labels.iter().enumerate().map(|(i, l)| (i, l.as_str())),
            &self.service_uuid,
            MatchRule::IgnoreAsciiCase,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::DeviceHandle;
    use uuid::Uuid;

    fn devices(names: &[&str]) -> Vec<DeviceRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                DeviceRecord::new(DeviceHandle(format!("dev-{i}")), n.to_string(), "N/A".into())
            })
            .collect()
    }

    #[test]
    fn picks_exact_device_name() {
        let policy = SelectionPolicy::new("M5Stack", "{5147b804-4b5b-429d-b6d2-0f4b8187a4ea}");
        let found = devices(&["Keyboard", "M5StickC", "M5Stack", "Mouse"]);

        assert_eq!(policy.pick_device(&found), Some(2));
    }

    #[test]
    fn device_name_is_case_sensitive() {
        let policy = SelectionPolicy::new("M5Stack", "");

        assert_eq!(policy.pick_device(&devices(&["m5stack", "M5STACK"])), None);
        assert_eq!(policy.pick_device(&[]), None);
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(
            select_index([(4, "a"), (7, "b"), (9, "b")], "b", MatchRule::Exact),
            Some(7)
        );
    }

    #[test]
    fn service_uuid_is_case_insensitive() {
        let policy = SelectionPolicy::new("M5Stack", "{5147B804-4B5B-429D-B6D2-0F4B8187A4EA}");
        let services = [
            ServiceRecord { uuid: Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb) },
            ServiceRecord { uuid: Uuid::from_u128(0x5147b804_4b5b_429d_b6d2_0f4b8187a4ea) },
        ];

        assert_eq!(policy.pick_service(&services), Some(1));
        assert_eq!(policy.pick_service(&services[..1]), None);
    }
}
