//! Bound device instances

use crate::accessory::BoundAccessory;
use crate::config::EngineConfig;
use crate::kind::DeviceKind;
use crate::record::{DevicePatch, RawDeviceRecord, VendorId};

/// Operations the device set needs from every bound device
pub trait DeviceInstance {
    /// Construct the instance for a freshly bound accessory
    fn new(
        kind: DeviceKind,
        accessory: BoundAccessory,
        data: RawDeviceRecord,
        config: &EngineConfig,
    ) -> Self
    where
        Self: Sized;

    fn id(&self) -> VendorId;

    /// Display name as stored on the accessory
    fn name(&self) -> &str;

    /// Latest known record for the device
    fn data(&self) -> &RawDeviceRecord;

    /// A full record arrived in a snapshot
    fn handle_snapshot(&mut self, record: &RawDeviceRecord);

    /// A partial update arrived in a push message
    fn handle_patch(&mut self, patch: &DevicePatch);
}

/// Default device instance: keeps the merged record and renders it through its kind
#[derive(Debug, Clone)]
pub struct Device {
    kind: DeviceKind,
    accessory: BoundAccessory,
    data: RawDeviceRecord,
    snapshots_handled: usize,
    patches_handled: usize,
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn accessory(&self) -> &BoundAccessory {
        &self.accessory
    }

    pub fn snapshots_handled(&self) -> usize {
        self.snapshots_handled
    }

    pub fn patches_handled(&self) -> usize {
        self.patches_handled
    }
}

impl DeviceInstance for Device {
    fn new(
        kind: DeviceKind,
        mut accessory: BoundAccessory,
        data: RawDeviceRecord,
        _config: &EngineConfig,
    ) -> Self {
        kind.render(&data, &mut accessory);
        Self {
            kind,
            accessory,
            data,
            snapshots_handled: 0,
            patches_handled: 0,
        }
    }

    fn id(&self) -> VendorId {
        self.accessory.context.id
    }

    fn name(&self) -> &str {
        &self.accessory.context.name
    }

    fn data(&self) -> &RawDeviceRecord {
        &self.data
    }

    fn handle_snapshot(&mut self, record: &RawDeviceRecord) {
        self.data = record.clone();
        self.kind.render(&self.data, &mut self.accessory);
        self.snapshots_handled += 1;
    }

    fn handle_patch(&mut self, patch: &DevicePatch) {
        self.data.merge(patch);
        self.kind.render(&self.data, &mut self.accessory);
        self.patches_handled += 1;
    }
}
