//! Keystone Core - Device reconciliation between a security-system vendor and a home hub
//!
//! This crate provides the pieces that turn the vendor's device inventory
//! into host accessories and keep them current:
//! - Vendor payload types (snapshots, patches, push messages)
//! - Device type registry with a fixed classification order
//! - Accessory factory deriving stable identities and metadata
//! - Device set routing snapshots and patches to bound devices

pub mod accessory;
pub mod config;
pub mod device;
pub mod device_set;
pub mod dictionary;
pub mod factory;
pub mod kind;
pub mod record;
pub mod sanitize;

pub use accessory::{AccessoryContext, BoundAccessory, Category, Characteristic, Service, ServiceKind};
pub use config::EngineConfig;
pub use device::{Device, DeviceInstance};
pub use device_set::{BindError, DeviceSet, MessageOutcome, SnapshotOutcome};
pub use dictionary::{DictionaryError, VendorDictionary};
pub use factory::AccessoryFactory;
pub use kind::{classify, DeviceKind, REGISTRY};
pub use record::{DevicePatch, Message, MessageData, RawDeviceRecord, Snapshot, VendorId};
pub use sanitize::sanitize_device_name;
