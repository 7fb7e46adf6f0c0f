//! Accessory factory: turns a vendor record into a host accessory
//!
//! Runs once per device at discovery time. Every rejection is logged and
//! reported as `None`; a single odd device never stops the rest of the
//! inventory from being processed.

use tracing::{debug, info};
use uuid::Uuid;

use crate::accessory::{AccessoryContext, BoundAccessory, Category, Characteristic, ServiceKind};
use crate::config::EngineConfig;
use crate::dictionary::VendorDictionary;
use crate::kind::{classify, DeviceKind};
use crate::record::RawDeviceRecord;
use crate::sanitize::sanitize_device_name;

/// Manufacturer reported for the vendor's own devices
pub const VENDOR_NAME: &str = "Vivint";

/// Device types with nothing to present on the host
pub const IGNORED_DEVICE_TYPES: &[&str] = &[
    "sensor_group",
    "network_hosts_service",
    "panel_diagnostics_service",
    "iot_service",
    "scheduler_service",
    "yofi_device",
    "keyfob_device",
    "control4_device",
    "lgit_poe_wifi_bridge_device",
    "mqtt_audio_sync_service",
    "holiday_theme_service",
];

/// Serial fingerprint: both serial numbers as 8-digit hex, then the vendor id
pub fn serial_fingerprint(record: &RawDeviceRecord) -> String {
    format!(
        "{:08x}:{:08x}:{}",
        record.serial_number_32bit.unwrap_or(0),
        record.serial_number.unwrap_or(0),
        record.id
    )
}

/// Host UUID for a device, stable across restarts
pub fn accessory_uuid(record: &RawDeviceRecord) -> Uuid {
    let name = format!("{}:{}:{}", VENDOR_NAME, record.id, serial_fingerprint(record));
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Builds accessories for newly discovered devices
#[derive(Debug, Clone)]
pub struct AccessoryFactory {
    config: EngineConfig,
    dictionary: VendorDictionary,
}

impl AccessoryFactory {
    pub fn new(config: EngineConfig, dictionary: VendorDictionary) -> Self {
        Self { config, dictionary }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create the accessory for a record, or `None` if it should not be presented
    pub fn create_accessory(&self, record: &RawDeviceRecord) -> Option<BoundAccessory> {
        if IGNORED_DEVICE_TYPES.contains(&record.device_type.as_str()) {
            debug!(
                id = record.id,
                device_type = %record.device_type,
                data = %dump(record),
                "Ignored unusable device"
            );
            return None;
        }

        let Some(kind) = classify(record) else {
            info!(
                id = record.id,
                device_type = %record.device_type,
                equipment_code = ?record.equipment_code,
                name = ?record.name,
                "Device not (yet) supported"
            );
            debug!(data = %dump(record), "Unsupported device found");
            return None;
        };

        if self.config.is_ignored(record) {
            info!(
                id = record.id,
                device_type = %record.device_type,
                equipment_code = ?record.equipment_code,
                name = ?record.name,
                "Ignored device"
            );
            return None;
        }

        let serial = serial_fingerprint(record);
        let uuid = accessory_uuid(record);
        let category = kind.infer_category(record).unwrap_or(Category::Other);
        let (manufacturer, model) = self.manufacturer_and_model(record, kind);

        let raw_name = match record.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Unnamed device ID{}", record.id),
        };
        let name = sanitize_device_name(&raw_name, record.id);

        let mut accessory = BoundAccessory::new(
            name.clone(),
            uuid,
            category,
            AccessoryContext {
                name,
                id: record.id,
                device_kind: kind.name().to_string(),
            },
        );

        let information = accessory.ensure_service(ServiceKind::AccessoryInformation);
        information
            .set(Characteristic::Manufacturer, manufacturer)
            .set(Characteristic::Model, model)
            .set(Characteristic::SerialNumber, serial);
        if let Some(firmware) = record.firmware_revision() {
            information.set(Characteristic::FirmwareRevision, firmware);
        }

        kind.add_services(&mut accessory, &self.config);

        if self.config.log_device_list {
            info!(
                id = record.id,
                device_type = %record.device_type,
                equipment_code = ?record.equipment_code,
                name = ?record.name,
                kind = kind.name(),
                "Managing device"
            );
        }

        Some(accessory)
    }

    fn manufacturer_and_model(&self, record: &RawDeviceRecord, kind: DeviceKind) -> (String, String) {
        let mut manufacturer = VENDOR_NAME.to_string();
        let mut model = record
            .equipment_code
            .and_then(|code| self.dictionary.equipment_name(code))
            .unwrap_or(kind.name())
            .to_string();

        // Third-party devices carry their origin as `maker_model`
        if let Some(actual) = record.actual_type.as_deref().filter(|a| !a.is_empty()) {
            match actual.split_once('_') {
                Some((maker, product)) => {
                    manufacturer = maker.to_uppercase();
                    model = product.to_uppercase();
                }
                None => manufacturer = actual.to_uppercase(),
            }
        }

        (manufacturer, model)
    }
}

fn dump(record: &RawDeviceRecord) -> String {
    serde_json::to_string_pretty(record).unwrap_or_default()
}
