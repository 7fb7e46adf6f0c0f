//! Vendor payload types
//!
//! Everything the vendor service sends is modelled here: per-device records
//! (delivered inside full snapshots), incremental device patches, and the
//! push messages that carry them. Field names follow the vendor's PascalCase
//! JSON; fields this crate does not interpret are kept in an open map so that
//! device adapters can still read them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Vendor device identifier
pub type VendorId = u64;

/// One device as reported by the vendor inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawDeviceRecord {
    pub id: VendorId,
    #[serde(rename = "Type", default)]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_code: Option<u32>,
    /// Origin marker for devices not built by the vendor, as `maker_model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "SerialNumber32Bit", default, skip_serializing_if = "Option::is_none")]
    pub serial_number_32bit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    /// Type-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Keys that identify a device and are never changed by a patch
const IDENTITY_KEYS: &[&str] = &[
    "Id",
    "Type",
    "EquipmentCode",
    "ActualType",
    "SerialNumber",
    "SerialNumber32Bit",
];

impl RawDeviceRecord {
    /// Create a record with just an id and a vendor type
    pub fn new(id: VendorId, device_type: impl Into<String>) -> Self {
        Self {
            id,
            device_type: device_type.into(),
            ..Default::default()
        }
    }

    /// Look up a type-specific field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Firmware revision, preferring the currently running version
    pub fn firmware_revision(&self) -> Option<&str> {
        self.current_software_version
            .as_deref()
            .or(self.software_version.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Overwrite the fields carried by `patch`, leaving everything else as is
    pub fn merge(&mut self, patch: &DevicePatch) {
        for (key, value) in &patch.fields {
            match key.as_str() {
                "Status" => self.status = Some(value.clone()),
                "Name" => self.name = value.as_str().map(str::to_owned),
                "CurrentSoftwareVersion" => {
                    self.current_software_version = value.as_str().map(str::to_owned)
                }
                "SoftwareVersion" => self.software_version = value.as_str().map(str::to_owned),
                k if IDENTITY_KEYS.contains(&k) => {
                    tracing::trace!(id = self.id, key = k, "Ignoring identity field in patch");
                }
                _ => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Incremental update targeting a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePatch {
    #[serde(rename = "Id")]
    pub id: VendorId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DevicePatch {
    /// A patch that only sets `Status`
    pub fn status(id: VendorId, status: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("Status".to_string(), status);
        Self { id, fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Full inventory dump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Aggregate security status of the whole system
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(rename = "Devices", default)]
    pub devices: Vec<RawDeviceRecord>,
}

impl Snapshot {
    pub fn find(&self, id: VendorId) -> Option<&RawDeviceRecord> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn find_mut(&mut self, id: VendorId) -> Option<&mut RawDeviceRecord> {
        self.devices.iter_mut().find(|d| d.id == id)
    }
}

/// Context the vendor attaches to per-device updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformContext {
    #[serde(rename = "Timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Payload of a push message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_context: Option<PlatformContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DevicePatch>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MessageData {
    /// Timestamp of the vendor context, if the sender provides one
    ///
    /// Some third-party device integrations push updates without any
    /// platform context at all.
    pub fn context_timestamp(&self) -> Option<u64> {
        self.platform_context.as_ref().and_then(|c| c.timestamp)
    }
}

/// Push message from the vendor service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(default)]
    pub id: VendorId,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}
