//! Device identity: device numbers, class names and sysfs locations.

pub mod class_map;
pub mod id;
pub mod sysfs;

pub use class_map::{DeviceClassCache, DeviceClassMap, PROC_DEVICES, PROC_MISC};
pub use id::DeviceId;
pub use sysfs::{SysfsLocator, SYSFS_CLASS, SYSFS_ROOT};
