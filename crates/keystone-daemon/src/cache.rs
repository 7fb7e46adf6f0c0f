//! Accessory cache persisted between runs
//!
//! Keeps every bound accessory together with the last record seen for it,
//! so the device set can be rebuilt at startup before the vendor sends a
//! fresh snapshot.

use keystone_core::{BoundAccessory, RawDeviceRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One cached accessory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessory {
    pub accessory: BoundAccessory,
    /// Last record known for the device
    pub data: RawDeviceRecord,
}

/// Cache file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessoryCache {
    /// Version of the cache format
    #[serde(default = "default_version")]
    pub version: String,
    /// When the cache was last written (RFC 3339)
    #[serde(default)]
    pub saved_at: Option<String>,
    #[serde(default)]
    pub accessories: Vec<CachedAccessory>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl AccessoryCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            version: default_version(),
            saved_at: None,
            accessories: Vec::new(),
        }
    }

    /// Load cache from a file
    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path)?;
        let cache: AccessoryCache = serde_json::from_str(&content)?;
        Ok(cache)
    }

    /// Load cache or create new if file doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self, CacheError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save cache to a file
    pub fn save(&mut self, path: &Path) -> Result<(), CacheError> {
        self.saved_at = Some(chrono::Utc::now().to_rfc3339());
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Add or replace the entry for an accessory's device
    pub fn upsert(&mut self, accessory: BoundAccessory, data: RawDeviceRecord) {
        let id = accessory.context.id;
        let entry = CachedAccessory { accessory, data };
        match self
            .accessories
            .iter_mut()
            .find(|c| c.accessory.context.id == id)
        {
            Some(existing) => *existing = entry,
            None => self.accessories.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.accessories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{AccessoryFactory, EngineConfig, VendorDictionary, VendorId};
    use tempfile::TempDir;

    fn lock(id: VendorId, name: &str) -> (BoundAccessory, RawDeviceRecord) {
        let mut record = RawDeviceRecord::new(id, "door_lock_device");
        record.name = Some(name.to_string());
        let factory =
            AccessoryFactory::new(EngineConfig::default(), VendorDictionary::builtin().unwrap());
        (factory.create_accessory(&record).unwrap(), record)
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut cache = AccessoryCache::new();
        let (accessory, data) = lock(3, "Front Door");
        cache.upsert(accessory, data);
        let (accessory, data) = lock(3, "Side Door");
        cache.upsert(accessory, data);
        let (accessory, data) = lock(4, "Back Door");
        cache.upsert(accessory, data);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.accessories[0].accessory.display_name, "Side Door");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("accessories.json");

        let mut cache = AccessoryCache::load_or_create(&path).unwrap();
        assert!(cache.is_empty());

        let (accessory, data) = lock(3, "Front Door");
        cache.upsert(accessory.clone(), data);
        cache.save(&path).unwrap();

        let reloaded = AccessoryCache::from_file(&path).unwrap();
        assert_eq!(reloaded.version, "1.0");
        assert!(reloaded.saved_at.is_some());
        assert_eq!(reloaded.accessories[0].accessory, accessory);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("accessories.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            AccessoryCache::load_or_create(&path),
            Err(CacheError::JsonError(_))
        ));
    }
}
