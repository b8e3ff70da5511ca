//! Shared vocabulary for server lifecycle state.
//!
//! `ResourceDescriptor` is what the locator hands to every other
//! operation. `LifecycleState` names where the server is between
//! invocations; it is derived on demand and never persisted.

use std::fmt;

use crate::provider::ResourceId;

/// Identity of the provisioned server, re-derived by search every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// `0` when no matching server exists.
    pub instance_id: ResourceId,
    /// Address of the first interface; empty when none is assigned.
    pub address: String,
    /// First attached disk; `0` when none.
    pub storage_id: ResourceId,
}

impl ResourceDescriptor {
    /// The "nothing matched" result.
    pub fn absent() -> Self {
        Self {
            instance_id: 0,
            address: String::new(),
            storage_id: 0,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.instance_id == 0
    }

    pub fn has_storage(&self) -> bool {
        self.storage_id != 0
    }

    /// Final report line: address then storage id.
    pub fn summary_line(&self) -> String {
        format!("{} {}", self.address, self.storage_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Absent,
    Provisioning,
    /// Provisioned and running.
    Active,
    Stopping,
    /// Provisioned and powered off.
    Inactive,
    Deleting,
    Deleted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Absent => "absent",
            LifecycleState::Provisioning => "provisioning",
            LifecycleState::Active => "active",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Deleting => "deleting",
            LifecycleState::Deleted => "deleted",
        };
        f.write_str(s)
    }
}
