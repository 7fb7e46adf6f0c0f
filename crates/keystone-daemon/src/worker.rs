//! Event worker: the single writer for the device set
//!
//! Vendor events are queued in arrival order and consumed by one task, so
//! snapshots, messages and bindings never interleave.

use keystone_core::{
    AccessoryFactory, BindError, DeviceInstance, DeviceSet, Message, MessageOutcome, Snapshot,
    SnapshotOutcome, VendorId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::AccessoryCache;

/// One unit of vendor traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorEvent {
    /// Full inventory fetched at `timestamp`
    Snapshot { timestamp: u64, inventory: Snapshot },
    /// Push message
    Message(Message),
}

/// Device set plus the state needed to grow it
pub struct Bridge {
    factory: AccessoryFactory,
    devices: DeviceSet,
    cache: AccessoryCache,
}

impl Bridge {
    pub fn new(factory: AccessoryFactory, panel_id: VendorId, cache: AccessoryCache) -> Self {
        let devices = DeviceSet::new(factory.config().clone(), panel_id);
        Self {
            factory,
            devices,
            cache,
        }
    }

    /// Bind every accessory from the cache
    pub fn restore(&mut self) -> Result<usize, BindError> {
        if self.cache.is_empty() {
            return Ok(0);
        }
        for cached in &self.cache.accessories {
            self.devices
                .bind(cached.accessory.clone(), cached.data.clone())?;
        }
        info!(count = self.devices.len(), "Restored cached accessories");
        Ok(self.devices.len())
    }

    pub fn handle(&mut self, event: VendorEvent) -> Result<(), BindError> {
        match event {
            VendorEvent::Snapshot {
                timestamp,
                inventory,
            } => {
                // Stale inventories may not bind or cache anything
                if timestamp >= self.devices.last_snapshot_time() {
                    let added = self.discover(&inventory)?;
                    if added > 0 {
                        info!(added, total = self.devices.len(), "Added new accessories");
                    }
                }
                match self.devices.apply_snapshot(inventory, timestamp) {
                    SnapshotOutcome::Applied { delivered } => {
                        debug!(timestamp, delivered, "Applied snapshot")
                    }
                    SnapshotOutcome::Stale { .. } => {}
                }
            }
            VendorEvent::Message(message) => {
                if let MessageOutcome::Dispatched { delivered, ignored } =
                    self.devices.apply_message(message)
                {
                    debug!(delivered, ignored, "Applied message");
                }
            }
        }
        Ok(())
    }

    /// Create and bind accessories for devices seen for the first time
    fn discover(&mut self, inventory: &Snapshot) -> Result<usize, BindError> {
        let mut added = 0;
        for record in &inventory.devices {
            if self.devices.is_bound(record.id) {
                continue;
            }
            if let Some(accessory) = self.factory.create_accessory(record) {
                self.cache.upsert(accessory.clone(), record.clone());
                self.devices.bind(accessory, record.clone())?;
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Cache reflecting the current state of every bound device
    pub fn into_cache(mut self) -> AccessoryCache {
        for device in self.devices.devices() {
            self.cache
                .upsert(device.accessory().clone(), device.data().clone());
        }
        self.cache
    }
}

/// Run the bridge on its own task until the queue closes
///
/// A bind failure ends the task and is returned to whoever awaits it.
pub fn spawn(mut bridge: Bridge, mut events: mpsc::Receiver<VendorEvent>) -> JoinHandle<Result<Bridge, BindError>> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            bridge.handle(event)?;
        }
        debug!("Event queue closed");
        Ok(bridge)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::accessory::{AccessoryContext, BoundAccessory, Category};
    use keystone_core::factory::accessory_uuid;
    use keystone_core::{EngineConfig, RawDeviceRecord, VendorDictionary};
    use serde_json::json;

    fn bridge(cache: AccessoryCache) -> Bridge {
        let factory =
            AccessoryFactory::new(EngineConfig::default(), VendorDictionary::builtin().unwrap());
        Bridge::new(factory, 5000, cache)
    }

    fn inventory(timestamp: u64) -> VendorEvent {
        serde_json::from_value(json!({
            "snapshot": {
                "timestamp": timestamp,
                "inventory": {
                    "Status": 3,
                    "Devices": [
                        {"Id": 2, "Type": "primary_touch_link_device", "Name": "Panel"},
                        {"Id": 3, "Type": "door_lock_device", "Name": "Front Door", "Status": true},
                        {"Id": 4, "Type": "keyfob_device", "Name": "Fob"},
                        {"Id": 5, "Type": "water_valve_device", "Name": "Valve"}
                    ]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_snapshot_discovers_and_applies() {
        let mut bridge = bridge(AccessoryCache::new());
        bridge.handle(inventory(100)).unwrap();

        assert_eq!(bridge.devices().len(), 2);
        assert_eq!(bridge.devices().panel_device_id(), 2);
        assert_eq!(bridge.devices().last_snapshot_time(), 100);
        assert_eq!(bridge.devices().get(2).unwrap().data().status, Some(json!(3)));
        assert_eq!(bridge.devices().get(3).unwrap().snapshots_handled(), 1);

        // Known devices are not created twice
        bridge.handle(inventory(200)).unwrap();
        assert_eq!(bridge.devices().len(), 2);
        assert_eq!(bridge.devices().get(3).unwrap().snapshots_handled(), 2);
    }

    #[test]
    fn test_stale_snapshot_binds_nothing() {
        let mut bridge = bridge(AccessoryCache::new());
        bridge.handle(inventory(200)).unwrap();

        let older: VendorEvent = serde_json::from_value(json!({
            "snapshot": {
                "timestamp": 100,
                "inventory": {
                    "Devices": [
                        {"Id": 6, "Type": "door_lock_device", "Name": "Back Door", "Status": false}
                    ]
                }
            }
        }))
        .unwrap();
        bridge.handle(older).unwrap();

        assert!(!bridge.devices().is_bound(6));
        assert_eq!(bridge.devices().len(), 2);
        assert_eq!(bridge.devices().last_snapshot_time(), 200);
        assert_eq!(bridge.cache.len(), 2);
    }

    #[test]
    fn test_restore_binds_cached_accessories() {
        let mut first = bridge(AccessoryCache::new());
        first.handle(inventory(100)).unwrap();
        let cache = first.into_cache();
        assert_eq!(cache.len(), 2);

        let mut second = bridge(cache);
        assert_eq!(second.restore().unwrap(), 2);
        assert_eq!(second.devices().get(3).unwrap().name(), "Front Door");
        second.handle(inventory(300)).unwrap();
        assert_eq!(second.devices().len(), 2);
    }

    #[test]
    fn test_restore_rejects_unknown_kind() {
        let record = RawDeviceRecord::new(8, "irrigation_device");
        let mut cache = AccessoryCache::new();
        cache.upsert(
            BoundAccessory::new(
                "Sprinkler".to_string(),
                accessory_uuid(&record),
                Category::Other,
                AccessoryContext {
                    name: "Sprinkler".to_string(),
                    id: 8,
                    device_kind: "sprinkler".to_string(),
                },
            ),
            record,
        );

        let mut bridge = bridge(cache);
        assert!(matches!(
            bridge.restore(),
            Err(BindError::UnknownDeviceKind { id: 8, .. })
        ));
    }

    #[tokio::test]
    async fn test_worker_processes_queue_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn(bridge(AccessoryCache::new()), rx);

        tx.send(inventory(100)).await.unwrap();
        let message: VendorEvent = serde_json::from_value(json!({
            "message": {
                "Id": 1,
                "Type": "inbox_message",
                "Data": {"Subject": "Alert: Front Door failed to lock"}
            }
        }))
        .unwrap();
        tx.send(message).await.unwrap();
        let stale: VendorEvent = serde_json::from_value(json!({
            "message": {
                "Id": 1,
                "Data": {
                    "PlatformContext": {"Timestamp": 50},
                    "Devices": [{"Id": 3, "Status": true}]
                }
            }
        }))
        .unwrap();
        tx.send(stale).await.unwrap();
        drop(tx);

        let bridge = handle.await.unwrap().unwrap();
        let lock = bridge.devices().get(3).unwrap();
        assert_eq!(lock.patches_handled(), 1);
        assert_eq!(lock.data().status, Some(json!(2)));
    }
}
