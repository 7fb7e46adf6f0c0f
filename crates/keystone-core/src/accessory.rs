//! Host accessory model
//!
//! A [`BoundAccessory`] is the host platform's persistent object for one
//! vendor device: a stable UUID, a presentation category, a persisted
//! context used to rebind it after a restart, and the service endpoints
//! the device type exposes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::record::VendorId;

/// `LockCurrentState` values
pub const LOCK_UNSECURED: u8 = 0;
pub const LOCK_SECURED: u8 = 1;
pub const LOCK_JAMMED: u8 = 2;

/// How the host presents an accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Other,
    DoorLock,
    Thermostat,
    GarageDoorOpener,
    SecuritySystem,
    IpCamera,
    Switch,
    Lightbulb,
}

impl Default for Category {
    fn default() -> Self {
        Self::Other
    }
}

/// Kind of service endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    AccessoryInformation,
    ContactSensor,
    SmokeSensor,
    CarbonMonoxideSensor,
    MotionSensor,
    LockMechanism,
    Thermostat,
    GarageDoorOpener,
    SecuritySystem,
    CameraRtpStreamManagement,
    Switch,
    Lightbulb,
}

/// Observable value on a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    Name,
    Manufacturer,
    Model,
    SerialNumber,
    FirmwareRevision,
    ContactSensorState,
    SmokeDetected,
    CarbonMonoxideDetected,
    MotionDetected,
    StatusLowBattery,
    LockCurrentState,
    LockTargetState,
    CurrentTemperature,
    CurrentHeatingCoolingState,
    CurrentDoorState,
    SecuritySystemCurrentState,
    On,
    Brightness,
}

/// A service endpoint and its current characteristic values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub kind: ServiceKind,
    #[serde(default)]
    pub characteristics: BTreeMap<Characteristic, Value>,
}

impl Service {
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            characteristics: BTreeMap::new(),
        }
    }

    /// Set a characteristic, returning `self` for chaining
    pub fn set(&mut self, characteristic: Characteristic, value: impl Into<Value>) -> &mut Self {
        self.characteristics.insert(characteristic, value.into());
        self
    }

    pub fn get(&self, characteristic: Characteristic) -> Option<&Value> {
        self.characteristics.get(&characteristic)
    }
}

/// Context persisted with the accessory so it can be rebound after a restart
///
/// Changing this shape breaks existing accessory caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryContext {
    /// Sanitized display name
    pub name: String,
    /// Vendor device id
    pub id: VendorId,
    /// Name of the device kind that owns the accessory
    pub device_kind: String,
}

/// Persistent host object for one vendor device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundAccessory {
    pub display_name: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub category: Category,
    pub context: AccessoryContext,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl BoundAccessory {
    /// Create an accessory carrying only its information service
    pub fn new(
        display_name: String,
        uuid: Uuid,
        category: Category,
        context: AccessoryContext,
    ) -> Self {
        let mut information = Service::new(ServiceKind::AccessoryInformation);
        information.set(Characteristic::Name, display_name.clone());

        Self {
            display_name,
            uuid,
            category,
            context,
            services: vec![information],
        }
    }

    pub fn service(&self, kind: ServiceKind) -> Option<&Service> {
        self.services.iter().find(|s| s.kind == kind)
    }

    pub fn service_mut(&mut self, kind: ServiceKind) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.kind == kind)
    }

    /// Return the service of this kind, adding it first if missing
    pub fn ensure_service(&mut self, kind: ServiceKind) -> &mut Service {
        let index = match self.services.iter().position(|s| s.kind == kind) {
            Some(index) => index,
            None => {
                self.services.push(Service::new(kind));
                self.services.len() - 1
            }
        };
        &mut self.services[index]
    }

    /// Read a characteristic from the first service of `kind`
    pub fn characteristic(&self, kind: ServiceKind, characteristic: Characteristic) -> Option<&Value> {
        self.service(kind)?.get(characteristic)
    }
}
