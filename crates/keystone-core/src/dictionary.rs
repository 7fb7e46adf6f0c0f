//! Vendor dictionary: names for the vendor's numeric and string codes
//!
//! The vendor publishes a dictionary of named tables (device types,
//! equipment codes, ...). A copy is compiled into the crate; a newer one can
//! be loaded from disk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Table names inside the dictionary
pub const PANEL_DEVICE_TYPE: &str = "PanelDeviceType";
pub const EQUIPMENT_TYPE: &str = "EquipmentType";
pub const EQUIPMENT_CODE: &str = "EquipmentCode";
pub const OBJECT_TYPE: &str = "ObjectType";

/// Vendor `Type` strings for the devices this crate understands
pub mod device_type {
    pub const BINARY_SWITCH: &str = "binary_switch_device";
    pub const CAMERA: &str = "camera_device";
    pub const DOOR_LOCK: &str = "door_lock_device";
    pub const GARAGE_DOOR: &str = "garage_door_device";
    pub const LIGHT_GROUP: &str = "light_group";
    pub const MULTILEVEL_SWITCH: &str = "multilevel_switch_device";
    pub const PANEL: &str = "primary_touch_link_device";
    pub const THERMOSTAT: &str = "thermostat_device";
    pub const WIRELESS_SENSOR: &str = "wireless_sensor";
}

/// Values of the `EquipmentType` field on wireless sensors
pub mod equipment_type {
    pub const CONTACT: u64 = 1;
    pub const MOTION: u64 = 2;
    pub const FIRE: u64 = 3;
    pub const CARBON_MONOXIDE: u64 = 4;
}

/// Message `Type` of inbox notifications
pub const INBOX_MESSAGE: &str = "inbox_message";

const BUILTIN: &str = include_str!("vendor_dictionary.json");

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("Failed to read dictionary: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse dictionary: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Named lookup tables published by the vendor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorDictionary {
    tables: BTreeMap<String, Map<String, Value>>,
}

impl VendorDictionary {
    /// Dictionary compiled into this crate
    pub fn builtin() -> Result<Self, DictionaryError> {
        Self::from_json(BUILTIN)
    }

    pub fn from_json(content: &str) -> Result<Self, DictionaryError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, DictionaryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Look up a value by its key in the named table
    pub fn get(&self, table: &str, key: &str) -> Option<&Value> {
        self.tables.get(table)?.get(key)
    }

    /// Reverse lookup: the key under which `value` is stored in `table`
    pub fn lookup_by_value(&self, table: &str, value: &Value) -> Option<&str> {
        self.tables
            .get(table)?
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(k, _)| k.as_str())
    }

    /// Human-readable model name for an equipment code
    pub fn equipment_name(&self, code: u32) -> Option<&str> {
        self.lookup_by_value(EQUIPMENT_CODE, &Value::from(code))
    }
}
