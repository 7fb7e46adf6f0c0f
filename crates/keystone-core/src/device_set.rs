//! Device set: the live registry of bound devices
//!
//! The device set owns every bound [`DeviceInstance`] and routes vendor
//! traffic to them:
//! - full snapshots, which also advance the staleness watermark
//! - push messages carrying device patches, including two synthetic cases
//!   (panel security status and jammed-lock notifications)
//!
//! All calls on one set must be serialized; the set is not meant to be
//! shared between writers.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::accessory::{BoundAccessory, LOCK_JAMMED};
use crate::config::EngineConfig;
use crate::device::{Device, DeviceInstance};
use crate::dictionary::{device_type, INBOX_MESSAGE};
use crate::kind::DeviceKind;
use crate::record::{DevicePatch, Message, RawDeviceRecord, Snapshot, VendorId};

const JAMMED_MARKER: &str = " failed to lock";
const ALERT_PREFIX: &str = "Alert: ";

/// Failure to bind a persisted accessory
///
/// Both cases mean the persisted accessory state cannot be trusted, and
/// should stop the caller rather than be skipped.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BindError {
    #[error("Unknown device kind {kind:?} on accessory for device {id}")]
    UnknownDeviceKind { id: VendorId, kind: String },
    #[error("Device {0} is already bound")]
    AlreadyBound(VendorId),
}

/// Result of applying a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Snapshot applied; `delivered` devices received a record
    Applied { delivered: usize },
    /// Snapshot older than the current watermark, dropped
    Stale { timestamp: u64, watermark: u64 },
}

/// Result of applying a push message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Message had no data payload
    Empty,
    /// Message older than the last snapshot, dropped
    Stale { timestamp: u64, watermark: u64 },
    /// Patches routed; `ignored` targeted devices that are not bound
    Dispatched { delivered: usize, ignored: usize },
}

/// Live registry of bound devices
pub struct DeviceSet<D: DeviceInstance = Device> {
    config: EngineConfig,
    /// Message id on which the vendor publishes the system's security status
    panel_channel_id: VendorId,
    /// Bound devices in bind order
    devices: Vec<D>,
    /// Vendor id -> index into `devices`
    by_id: HashMap<VendorId, usize>,
    last_snapshot_time: u64,
    /// Vendor id of the bound panel device, 0 until bound
    panel_device_id: VendorId,
}

impl<D: DeviceInstance> DeviceSet<D> {
    pub fn new(config: EngineConfig, panel_channel_id: VendorId) -> Self {
        Self {
            config,
            panel_channel_id,
            devices: Vec::new(),
            by_id: HashMap::new(),
            last_snapshot_time: 0,
            panel_device_id: 0,
        }
    }

    /// Bind an accessory to a new device instance
    ///
    /// The device kind comes from the accessory's persisted context, not from
    /// classifying `data` again, so accessories restored from a cache bind the
    /// same way as freshly created ones.
    pub fn bind(&mut self, accessory: BoundAccessory, data: RawDeviceRecord) -> Result<(), BindError> {
        let id = accessory.context.id;
        let kind = DeviceKind::from_name(&accessory.context.device_kind).ok_or_else(|| {
            BindError::UnknownDeviceKind {
                id,
                kind: accessory.context.device_kind.clone(),
            }
        })?;

        if self.by_id.contains_key(&id) {
            return Err(BindError::AlreadyBound(id));
        }

        let device = D::new(kind, accessory, data, &self.config);
        self.by_id.insert(id, self.devices.len());
        self.devices.push(device);

        if kind.is_panel() {
            self.panel_device_id = id;
        }

        debug!(id, kind = kind.name(), "Bound device");
        Ok(())
    }

    /// Apply a full inventory snapshot taken at `timestamp`
    pub fn apply_snapshot(&mut self, mut snapshot: Snapshot, timestamp: u64) -> SnapshotOutcome {
        if timestamp < self.last_snapshot_time {
            warn!(
                timestamp,
                watermark = self.last_snapshot_time,
                "Ignoring snapshot older than the last one applied"
            );
            return SnapshotOutcome::Stale {
                timestamp,
                watermark: self.last_snapshot_time,
            };
        }

        self.last_snapshot_time = timestamp;
        debug!(timestamp, "Handling incoming device snapshot");

        // The panel's status lives on the inventory, not on its own record
        if let Some(status) = snapshot.status.take() {
            match snapshot.find_mut(self.panel_device_id) {
                Some(panel) => panel.status = Some(status),
                None if self.is_bound(self.panel_device_id) => {
                    let mut panel = RawDeviceRecord::new(self.panel_device_id, device_type::PANEL);
                    panel.status = Some(status);
                    snapshot.devices.push(panel);
                }
                None => {}
            }
        }

        // First record wins when an id repeats, matching the relocation above
        let mut records: HashMap<VendorId, &RawDeviceRecord> = HashMap::new();
        for record in &snapshot.devices {
            records.entry(record.id).or_insert(record);
        }

        let mut delivered = 0;
        for device in &mut self.devices {
            if let Some(record) = records.get(&device.id()) {
                device.handle_snapshot(record);
                delivered += 1;
            }
        }

        SnapshotOutcome::Applied { delivered }
    }

    /// Apply a push message
    pub fn apply_message(&mut self, message: Message) -> MessageOutcome {
        let Some(mut data) = message.data else {
            trace!(id = message.id, "Message without data");
            return MessageOutcome::Empty;
        };

        if let Some(timestamp) = data.context_timestamp() {
            if timestamp < self.last_snapshot_time {
                warn!(
                    timestamp,
                    watermark = self.last_snapshot_time,
                    "Ignoring stale update"
                );
                return MessageOutcome::Stale {
                    timestamp,
                    watermark: self.last_snapshot_time,
                };
            }
        }

        if self.panel_channel_id != 0 && message.id == self.panel_channel_id && data.status.is_some() {
            if let Some(status) = data.status.take() {
                data.devices = Some(vec![DevicePatch::status(self.panel_device_id, status)]);
            }
        } else if message.message_type.as_deref() == Some(INBOX_MESSAGE) {
            if let Some(lock_name) = data.subject.as_deref().and_then(jammed_lock_name) {
                match self.find_lock(lock_name) {
                    Some(id) => {
                        info!(id, lock = lock_name, "Lock reported as jammed");
                        data.devices = Some(vec![DevicePatch::status(id, json!(LOCK_JAMMED))]);
                    }
                    None => debug!(lock = lock_name, "No bound lock matches jam notification"),
                }
            }
        }

        let mut delivered = 0;
        let mut ignored = 0;
        for patch in data.devices.iter().flatten() {
            match self.by_id.get(&patch.id) {
                Some(&index) => {
                    self.devices[index].handle_patch(patch);
                    delivered += 1;
                }
                None => {
                    trace!(id = patch.id, "Patch for unbound device");
                    ignored += 1;
                }
            }
        }

        MessageOutcome::Dispatched { delivered, ignored }
    }

    fn find_lock(&self, name: &str) -> Option<VendorId> {
        self.devices
            .iter()
            .find(|d| d.data().device_type == device_type::DOOR_LOCK && d.name() == name)
            .map(|d| d.id())
    }

    /// Bound devices in bind order
    pub fn devices(&self) -> &[D] {
        &self.devices
    }

    pub fn get(&self, id: VendorId) -> Option<&D> {
        self.by_id.get(&id).map(|&index| &self.devices[index])
    }

    pub fn is_bound(&self, id: VendorId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Vendor id of the panel device, 0 if none is bound
    pub fn panel_device_id(&self) -> VendorId {
        self.panel_device_id
    }

    /// Timestamp of the last applied snapshot
    pub fn last_snapshot_time(&self) -> u64 {
        self.last_snapshot_time
    }
}

/// Extract the lock name from a subject like `"Alert: Front Door failed to lock"`
fn jammed_lock_name(subject: &str) -> Option<&str> {
    if !subject.contains(JAMMED_MARKER) {
        return None;
    }

    let rest = subject
        .split_once(ALERT_PREFIX)
        .map_or(subject, |(_, rest)| rest);
    let name = rest.split(JAMMED_MARKER).next()?;
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::{AccessoryContext, Category};
    use crate::record::MessageData;
    use uuid::Uuid;

    fn accessory(id: VendorId, name: &str, kind: &str) -> BoundAccessory {
        BoundAccessory::new(
            name.to_string(),
            Uuid::nil(),
            Category::Other,
            AccessoryContext {
                name: name.to_string(),
                id,
                device_kind: kind.to_string(),
            },
        )
    }

    #[test]
    fn test_jammed_lock_name() {
        assert_eq!(jammed_lock_name("Alert: Front Door failed to lock"), Some("Front Door"));
        assert_eq!(jammed_lock_name("Front Door failed to lock"), Some("Front Door"));
        assert_eq!(jammed_lock_name("Alert: Front Door locked"), None);
        assert_eq!(jammed_lock_name("Alert:  failed to lock"), None);
        assert_eq!(jammed_lock_name("Alert: Gate  failed to lock"), Some("Gate "));
        assert_eq!(jammed_lock_name("Alert:  Gate failed to lock"), Some(" Gate"));
    }

    #[test]
    fn test_jam_matches_name_with_trailing_space() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(3, "Gate ", "lock"), RawDeviceRecord::new(3, device_type::DOOR_LOCK))
            .unwrap();
        set.bind(accessory(4, "Gate", "lock"), RawDeviceRecord::new(4, device_type::DOOR_LOCK))
            .unwrap();

        let message = Message {
            id: 1,
            message_type: Some(INBOX_MESSAGE.to_string()),
            data: Some(MessageData {
                subject: Some("Alert: Gate  failed to lock".to_string()),
                ..Default::default()
            }),
        };
        set.apply_message(message);
        assert_eq!(set.get(3).unwrap().data().status, Some(json!(LOCK_JAMMED)));
        assert_eq!(set.get(4).unwrap().patches_handled(), 0);
    }

    #[test]
    fn test_panel_record_synthesized_when_absent() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(9, "Panel", "panel"), RawDeviceRecord::new(9, device_type::PANEL))
            .unwrap();

        let snapshot = Snapshot {
            status: Some(json!("armed")),
            devices: Vec::new(),
        };
        assert_eq!(
            set.apply_snapshot(snapshot, 10),
            SnapshotOutcome::Applied { delivered: 1 }
        );
        let panel = set.get(9).unwrap();
        assert_eq!(panel.data().id, 9);
        assert_eq!(panel.data().status, Some(json!("armed")));
    }

    #[test]
    fn test_no_panel_record_without_bound_panel() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(1, "Lock", "lock"), RawDeviceRecord::new(1, device_type::DOOR_LOCK))
            .unwrap();

        let snapshot = Snapshot {
            status: Some(json!("armed")),
            devices: Vec::new(),
        };
        assert_eq!(
            set.apply_snapshot(snapshot, 10),
            SnapshotOutcome::Applied { delivered: 0 }
        );
    }

    #[test]
    fn test_repeated_id_delivers_first_record() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(2, "Panel", "panel"), RawDeviceRecord::new(2, device_type::PANEL))
            .unwrap();

        let mut second = RawDeviceRecord::new(2, device_type::PANEL);
        second.fields.insert("Extra".to_string(), json!(1));
        let snapshot = Snapshot {
            status: Some(json!("armed")),
            devices: vec![RawDeviceRecord::new(2, device_type::PANEL), second],
        };
        assert_eq!(
            set.apply_snapshot(snapshot, 10),
            SnapshotOutcome::Applied { delivered: 1 }
        );

        let panel = set.get(2).unwrap();
        assert_eq!(panel.data().status, Some(json!("armed")));
        assert!(panel.data().field("Extra").is_none());
    }

    #[test]
    fn test_bind_unknown_kind_is_fatal() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        let err = set
            .bind(accessory(4, "Mystery", "Sprinkler"), RawDeviceRecord::new(4, "x"))
            .unwrap_err();
        assert_eq!(
            err,
            BindError::UnknownDeviceKind {
                id: 4,
                kind: "Sprinkler".to_string()
            }
        );
        assert!(set.is_empty());
    }

    #[test]
    fn test_bind_twice_rejected() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        let record = RawDeviceRecord::new(4, device_type::DOOR_LOCK);
        set.bind(accessory(4, "Lock", "lock"), record.clone()).unwrap();
        assert_eq!(
            set.bind(accessory(4, "Lock", "lock"), record),
            Err(BindError::AlreadyBound(4))
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_panel_id_recorded() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(1, "Lock", "lock"), RawDeviceRecord::new(1, device_type::DOOR_LOCK))
            .unwrap();
        assert_eq!(set.panel_device_id(), 0);
        set.bind(accessory(9, "Panel", "panel"), RawDeviceRecord::new(9, device_type::PANEL))
            .unwrap();
        assert_eq!(set.panel_device_id(), 9);
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(1, "Lock", "lock"), RawDeviceRecord::new(1, device_type::DOOR_LOCK))
            .unwrap();

        let snapshot = Snapshot {
            status: None,
            devices: vec![RawDeviceRecord::new(1, device_type::DOOR_LOCK)],
        };
        assert_eq!(
            set.apply_snapshot(snapshot.clone(), 200),
            SnapshotOutcome::Applied { delivered: 1 }
        );
        assert_eq!(
            set.apply_snapshot(snapshot.clone(), 150),
            SnapshotOutcome::Stale {
                timestamp: 150,
                watermark: 200
            }
        );
        assert_eq!(set.last_snapshot_time(), 200);
        assert_eq!(
            set.apply_snapshot(snapshot, 200),
            SnapshotOutcome::Applied { delivered: 1 }
        );
        assert_eq!(set.get(1).unwrap().snapshots_handled(), 2);
    }

    #[test]
    fn test_message_without_data() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        assert_eq!(set.apply_message(Message::default()), MessageOutcome::Empty);
    }

    #[test]
    fn test_untimestamped_message_bypasses_guard() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(1, "Lock", "lock"), RawDeviceRecord::new(1, device_type::DOOR_LOCK))
            .unwrap();
        set.apply_snapshot(Snapshot::default(), 500);

        let message = Message {
            id: 77,
            message_type: None,
            data: Some(MessageData {
                devices: Some(vec![DevicePatch::status(1, json!(true))]),
                ..Default::default()
            }),
        };
        assert_eq!(
            set.apply_message(message),
            MessageOutcome::Dispatched {
                delivered: 1,
                ignored: 0
            }
        );
    }

    #[test]
    fn test_panel_channel_zero_never_matches() {
        let mut set: DeviceSet = DeviceSet::new(EngineConfig::default(), 0);
        set.bind(accessory(9, "Panel", "panel"), RawDeviceRecord::new(9, device_type::PANEL))
            .unwrap();

        let message = Message {
            id: 0,
            message_type: None,
            data: Some(MessageData {
                status: Some(json!(3)),
                ..Default::default()
            }),
        };
        assert_eq!(
            set.apply_message(message),
            MessageOutcome::Dispatched {
                delivered: 0,
                ignored: 0
            }
        );
        assert_eq!(set.get(9).unwrap().patches_handled(), 0);
    }
}
