//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Shared read-mostly disk registration

use crate::RegistrarError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;
use vmhost_service::DeviceAddress;

/// Longest virtual machine user id
const MAX_USER_LEN: usize = 8;

/// Identifier assigned to a registered shared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedResourceId(u32);

impl SharedResourceId {
    /// Get the underlying value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SharedResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHR{:04}", self.0)
    }
}

/// Registers shared storage resources on behalf of the operator
pub trait SharedResourceRegistrar: Send + Sync {
    /// Register a shared resource owned by `user` at `device`
    fn register_shared_resource(
        &self,
        user: &str,
        device: DeviceAddress,
        base_file: &str,
    ) -> Result<SharedResourceId, RegistrarError>;
}

/// A registered shared CKD disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDisk {
    /// Assigned identifier
    pub id: SharedResourceId,
    /// Owning user id (uppercase)
    pub user: String,
    /// Base file specification
    pub base_file: String,
}

/// In-memory registrar keyed by device address
#[derive(Debug)]
pub struct SharedDiskRegistry {
    disks: DashMap<DeviceAddress, SharedDisk>,
    next_id: AtomicU32,
}

impl Default for SharedDiskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedDiskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            disks: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Look up the disk registered at `device`
    pub fn get(&self, device: DeviceAddress) -> Option<SharedDisk> {
        self.disks.get(&device).map(|entry| entry.value().clone())
    }

    /// Number of registered disks
    pub fn len(&self) -> usize {
        self.disks.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }
}

impl SharedResourceRegistrar for SharedDiskRegistry {
    fn register_shared_resource(
        &self,
        user: &str,
        device: DeviceAddress,
        base_file: &str,
    ) -> Result<SharedResourceId, RegistrarError> {
        if user.is_empty()
            || user.len() > MAX_USER_LEN
            || !user.chars().all(|c| c.is_ascii_alphanumeric() || "$#@".contains(c))
        {
            return Err(RegistrarError::InvalidUser(user.to_string()));
        }
        if base_file.trim().is_empty() {
            return Err(RegistrarError::InvalidBaseFile(base_file.to_string()));
        }

        match self.disks.entry(device) {
            Entry::Occupied(_) => Err(RegistrarError::DuplicateDevice(device)),
            Entry::Vacant(vacant) => {
                let id = SharedResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
                vacant.insert(SharedDisk {
                    id,
                    user: user.to_ascii_uppercase(),
                    base_file: base_file.to_string(),
                });
                info!(id = %id, user, device = %device, base_file, "Shared disk registered");
                Ok(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuu(value: u16) -> DeviceAddress {
        DeviceAddress::new(value).unwrap()
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let registry = SharedDiskRegistry::new();
        let first = registry
            .register_shared_resource("maint", cuu(0x190), "vm370/maint190.ckd")
            .unwrap();
        let second = registry
            .register_shared_resource("CMSUSER", cuu(0x19E), "vm370/cms19e.ckd")
            .unwrap();

        assert_eq!(first.to_string(), "SHR0001");
        assert_eq!(second.as_u32(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(cuu(0x190)).unwrap().user, "MAINT");
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let registry = SharedDiskRegistry::new();
        registry
            .register_shared_resource("MAINT", cuu(0x190), "a.ckd")
            .unwrap();
        assert_eq!(
            registry.register_shared_resource("OTHER", cuu(0x190), "b.ckd"),
            Err(RegistrarError::DuplicateDevice(cuu(0x190)))
        );
        assert_eq!(registry.get(cuu(0x190)).unwrap().base_file, "a.ckd");
    }

    #[test]
    fn test_invalid_user_rejected() {
        let registry = SharedDiskRegistry::new();
        assert!(matches!(
            registry.register_shared_resource("TOOLONGUSER", cuu(0x191), "a.ckd"),
            Err(RegistrarError::InvalidUser(_))
        ));
        assert!(matches!(
            registry.register_shared_resource("BAD/ID", cuu(0x191), "a.ckd"),
            Err(RegistrarError::InvalidUser(_))
        ));
        assert!(registry.is_empty());
    }
}
