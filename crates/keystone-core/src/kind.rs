//! Device type registry
//!
//! Every device type the bridge can present is a [`DeviceKind`] variant.
//! [`REGISTRY`] fixes the order in which kinds are tried: the first kind
//! whose predicate accepts a record owns it.

use serde_json::Value;

use crate::accessory::{
    BoundAccessory, Category, Characteristic, ServiceKind, LOCK_SECURED, LOCK_UNSECURED,
};
use crate::config::EngineConfig;
use crate::dictionary::{device_type, equipment_type};
use crate::record::RawDeviceRecord;

/// A class of vendor device and the policy for presenting it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    ContactSensor,
    SmokeSensor,
    CarbonMonoxideSensor,
    MotionSensor,
    Lock,
    Thermostat,
    GarageDoor,
    Panel,
    Camera,
    LightSwitch,
    DimmerSwitch,
    LightGroup,
}

/// Classification priority, highest first
pub const REGISTRY: [DeviceKind; 12] = [
    DeviceKind::ContactSensor,
    DeviceKind::SmokeSensor,
    DeviceKind::CarbonMonoxideSensor,
    DeviceKind::MotionSensor,
    DeviceKind::Lock,
    DeviceKind::Thermostat,
    DeviceKind::GarageDoor,
    DeviceKind::Panel,
    DeviceKind::Camera,
    DeviceKind::LightSwitch,
    DeviceKind::DimmerSwitch,
    DeviceKind::LightGroup,
];

/// Find the kind that owns a record, if any
pub fn classify(record: &RawDeviceRecord) -> Option<DeviceKind> {
    REGISTRY.iter().copied().find(|kind| kind.applies_to(record))
}

impl DeviceKind {
    /// Stable name, persisted in the accessory context
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContactSensor => "contact_sensor",
            Self::SmokeSensor => "smoke_sensor",
            Self::CarbonMonoxideSensor => "carbon_monoxide_sensor",
            Self::MotionSensor => "motion_sensor",
            Self::Lock => "lock",
            Self::Thermostat => "thermostat",
            Self::GarageDoor => "garage_door",
            Self::Panel => "panel",
            Self::Camera => "camera",
            Self::LightSwitch => "light_switch",
            Self::DimmerSwitch => "dimmer_switch",
            Self::LightGroup => "light_group",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn applies_to(&self, record: &RawDeviceRecord) -> bool {
        let sensor_type = || {
            if record.device_type == device_type::WIRELESS_SENSOR {
                record.field("EquipmentType").and_then(Value::as_u64)
            } else {
                None
            }
        };

        match self {
            Self::ContactSensor => sensor_type() == Some(equipment_type::CONTACT),
            Self::SmokeSensor => sensor_type() == Some(equipment_type::FIRE),
            Self::CarbonMonoxideSensor => sensor_type() == Some(equipment_type::CARBON_MONOXIDE),
            Self::MotionSensor => sensor_type() == Some(equipment_type::MOTION),
            Self::Lock => record.device_type == device_type::DOOR_LOCK,
            Self::Thermostat => record.device_type == device_type::THERMOSTAT,
            Self::GarageDoor => record.device_type == device_type::GARAGE_DOOR,
            Self::Panel => record.device_type == device_type::PANEL,
            Self::Camera => record.device_type == device_type::CAMERA,
            Self::LightSwitch => record.device_type == device_type::BINARY_SWITCH,
            Self::DimmerSwitch => record.device_type == device_type::MULTILEVEL_SWITCH,
            Self::LightGroup => record.device_type == device_type::LIGHT_GROUP,
        }
    }

    /// Presentation category, when the kind has an opinion
    pub fn infer_category(&self, _record: &RawDeviceRecord) -> Option<Category> {
        match self {
            Self::Lock => Some(Category::DoorLock),
            Self::Thermostat => Some(Category::Thermostat),
            Self::GarageDoor => Some(Category::GarageDoorOpener),
            Self::Panel => Some(Category::SecuritySystem),
            Self::Camera => Some(Category::IpCamera),
            Self::LightSwitch => Some(Category::Switch),
            Self::DimmerSwitch | Self::LightGroup => Some(Category::Lightbulb),
            Self::ContactSensor
            | Self::SmokeSensor
            | Self::CarbonMonoxideSensor
            | Self::MotionSensor => None,
        }
    }

    /// Whether this kind is the alarm panel
    pub fn is_panel(&self) -> bool {
        matches!(self, Self::Panel)
    }

    fn primary_service(&self) -> ServiceKind {
        match self {
            Self::ContactSensor => ServiceKind::ContactSensor,
            Self::SmokeSensor => ServiceKind::SmokeSensor,
            Self::CarbonMonoxideSensor => ServiceKind::CarbonMonoxideSensor,
            Self::MotionSensor => ServiceKind::MotionSensor,
            Self::Lock => ServiceKind::LockMechanism,
            Self::Thermostat => ServiceKind::Thermostat,
            Self::GarageDoor => ServiceKind::GarageDoorOpener,
            Self::Panel => ServiceKind::SecuritySystem,
            Self::Camera => ServiceKind::CameraRtpStreamManagement,
            Self::LightSwitch => ServiceKind::Switch,
            Self::DimmerSwitch | Self::LightGroup => ServiceKind::Lightbulb,
        }
    }

    /// Attach the service endpoints this kind needs
    pub fn add_services(&self, accessory: &mut BoundAccessory, config: &EngineConfig) {
        accessory.ensure_service(self.primary_service());

        if matches!(self, Self::Camera) && config.camera_motion_sensor {
            accessory.ensure_service(ServiceKind::MotionSensor);
        }
    }

    /// Project a record's state onto the accessory's characteristics
    ///
    /// Fields a record does not carry leave the matching characteristic
    /// untouched.
    pub fn render(&self, record: &RawDeviceRecord, accessory: &mut BoundAccessory) {
        let status = record.status.as_ref();
        let service = accessory.ensure_service(self.primary_service());

        match self {
            Self::ContactSensor => {
                if let Some(open) = status.and_then(flag) {
                    service.set(Characteristic::ContactSensorState, u8::from(open));
                }
            }
            Self::SmokeSensor => {
                if let Some(detected) = status.and_then(flag) {
                    service.set(Characteristic::SmokeDetected, u8::from(detected));
                }
            }
            Self::CarbonMonoxideSensor => {
                if let Some(detected) = status.and_then(flag) {
                    service.set(Characteristic::CarbonMonoxideDetected, u8::from(detected));
                }
            }
            Self::MotionSensor => {
                if let Some(detected) = status.and_then(flag) {
                    service.set(Characteristic::MotionDetected, detected);
                }
            }
            Self::Lock => {
                if let Some(state) = status.and_then(lock_state) {
                    service.set(Characteristic::LockCurrentState, state);
                    if state == LOCK_SECURED || state == LOCK_UNSECURED {
                        service.set(Characteristic::LockTargetState, state);
                    }
                }
            }
            Self::Thermostat => {
                if let Some(temperature) = record.field("Val").and_then(Value::as_f64) {
                    service.set(Characteristic::CurrentTemperature, temperature);
                }
                if let Some(mode) = record.field("OperatingState").and_then(Value::as_u64) {
                    service.set(Characteristic::CurrentHeatingCoolingState, mode);
                }
            }
            Self::GarageDoor => {
                if let Some(state) = status.and_then(Value::as_u64).and_then(door_state) {
                    service.set(Characteristic::CurrentDoorState, state);
                }
            }
            Self::Panel => {
                if let Some(state) = status.and_then(security_state) {
                    service.set(Characteristic::SecuritySystemCurrentState, state);
                }
            }
            Self::Camera => {}
            Self::LightSwitch | Self::LightGroup => {
                if let Some(on) = status.and_then(flag) {
                    service.set(Characteristic::On, on);
                }
            }
            Self::DimmerSwitch => {
                if let Some(on) = status.and_then(flag) {
                    service.set(Characteristic::On, on);
                }
                if let Some(level) = record.field("Value").and_then(Value::as_u64) {
                    service.set(Characteristic::Brightness, level.min(100));
                }
            }
        }

        if let Some(low) = record.field("LowBattery").and_then(flag) {
            service.set(Characteristic::StatusLowBattery, u8::from(low));
        }

        if matches!(self, Self::Camera) {
            if let Some(motion) = record.field("PersonDetected").and_then(flag) {
                if let Some(sensor) = accessory.service_mut(ServiceKind::MotionSensor) {
                    sensor.set(Characteristic::MotionDetected, motion);
                }
            }
        }
    }
}

/// Vendor booleans arrive as either `true`/`false` or `0`/`1`
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

fn lock_state(value: &Value) -> Option<u8> {
    match value {
        Value::Bool(true) => Some(LOCK_SECURED),
        Value::Bool(false) => Some(LOCK_UNSECURED),
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        _ => None,
    }
}

/// Vendor garage states (1 closing, 2 closed, 3 opening, 4 open)
fn door_state(vendor: u64) -> Option<u8> {
    match vendor {
        4 => Some(0),
        2 => Some(1),
        3 => Some(2),
        1 => Some(3),
        _ => None,
    }
}

/// Host security states: 0 stay, 1 away, 3 disarmed, 4 triggered
fn security_state(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => match n.as_u64()? {
            0 => Some(3),
            3 => Some(0),
            4 => Some(1),
            5 | 6 => Some(4),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "disarmed" => Some(3),
            "armed" | "armed_stay" => Some(0),
            "armed_away" => Some(1),
            "alarm" => Some(4),
            _ => None,
        },
        _ => None,
    }
}
