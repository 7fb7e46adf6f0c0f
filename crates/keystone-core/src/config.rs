//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::record::RawDeviceRecord;

/// Settings that shape which devices are exposed and how
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Device types, equipment codes or literal device ids to leave out
    #[serde(default)]
    pub ignore_device_types: Vec<String>,
    /// Log every device that gets an accessory
    #[serde(default)]
    pub log_device_list: bool,
    /// Give cameras a motion sensor endpoint
    #[serde(default = "default_true")]
    pub camera_motion_sensor: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_device_types: Vec::new(),
            log_device_list: false,
            camera_motion_sensor: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Whether the user asked to leave this device out
    ///
    /// Matches on the vendor type, the equipment code or the device id.
    pub fn is_ignored(&self, record: &RawDeviceRecord) -> bool {
        let code = record.equipment_code.map(|c| c.to_string());
        let id = record.id.to_string();

        self.ignore_device_types.iter().any(|token| {
            *token == record.device_type || Some(token) == code.as_ref() || *token == id
        })
    }
}
