//! Cloud control-plane contract.
//!
//! `CloudProvider` is everything the orchestrator needs from the cloud:
//! lookups, resource creation, power control and teardown. The Sakura
//! Cloud REST client implements it; tests use a recording fake.

pub mod models;
pub mod sakura;

#[cfg(test)]
pub mod fake;

use std::fmt;

use thiserror::Error;

/// Provider-assigned resource id. `0` never names a real resource.
pub type ResourceId = i64;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected resource state: {0}")]
    State(String),
}

impl ProviderError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ProviderError::Api { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

// ── Queries ─────────────────────────────────────────────

/// Server search: name substring, paging and included columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerQuery {
    pub name_like: String,
    pub offset: u32,
    pub limit: u32,
    pub include: Vec<&'static str>,
}

/// Base image OS family, matched against the provider's distro tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsFamily {
    #[default]
    CentOs,
    Ubuntu,
    Debian,
    Rocky,
    Alma,
}

impl OsFamily {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "centos" => Some(Self::CentOs),
            "ubuntu" => Some(Self::Ubuntu),
            "debian" => Some(Self::Debian),
            "rocky" | "rockylinux" => Some(Self::Rocky),
            "alma" | "almalinux" => Some(Self::Alma),
            _ => None,
        }
    }

    /// Archive tag that marks this distribution.
    pub fn distro_tag(self) -> &'static str {
        match self {
            Self::CentOs => "distro-centos",
            Self::Ubuntu => "distro-ubuntu",
            Self::Debian => "distro-debian",
            Self::Rocky => "distro-rocky",
            Self::Alma => "distro-alma",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.distro_tag().trim_start_matches("distro-"))
    }
}

// ── Resources ───────────────────────────────────────────

/// A server as returned by search, with its interface and disk associations.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSummary {
    pub id: ResourceId,
    pub name: String,
    /// One entry per interface, in interface order. Empty when unassigned.
    pub addresses: Vec<String>,
    pub disk_ids: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub id: ResourceId,
    pub name: String,
}

/// A startup script bundle ("note") applied during disk configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: ResourceId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerPlan {
    pub id: ResourceId,
    pub cpu: u32,
    pub memory_gb: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskPlan {
    Ssd,
}

impl DiskPlan {
    pub fn id(self) -> ResourceId {
        match self {
            DiskPlan::Ssd => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub plan: DiskPlan,
    pub source_archive: ResourceId,
}

/// Copy state of a disk created from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Migrating,
    Failed,
    Other(String),
}

impl Availability {
    pub fn parse(s: &str) -> Self {
        match s {
            "available" => Self::Available,
            "migrating" | "uploading" => Self::Migrating,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disk {
    pub id: ResourceId,
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerRequest {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub plan_id: ResourceId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub id: ResourceId,
}

/// Pre-boot guest configuration written onto a disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskEdit {
    pub hostname: String,
    pub password: String,
    pub ssh_keys: Vec<String>,
    pub notes: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    Up,
    Down,
    Other(String),
}

impl PowerState {
    pub fn parse(s: &str) -> Self {
        match s {
            "up" => Self::Up,
            "down" => Self::Down,
            other => Self::Other(other.to_string()),
        }
    }
}

// ── Contract ────────────────────────────────────────────

/// Operations consumed from the cloud control plane.
///
/// All calls are authenticated with the credentials the implementation
/// was constructed with.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait CloudProvider {
    async fn find_servers(&self, query: &ServerQuery) -> Result<Vec<ServerSummary>>;

    async fn find_latest_stable_archive(&self, os: OsFamily) -> Result<Archive>;

    /// Shared-scope script bundles whose name contains `name_like`.
    async fn find_shared_notes(&self, name_like: &str, limit: u32) -> Result<Vec<Note>>;

    async fn create_disk(&self, req: &DiskRequest) -> Result<Disk>;

    async fn read_disk(&self, disk_id: ResourceId) -> Result<Disk>;

    /// Match a CPU count and memory size (GiB) against the plan catalog.
    async fn find_server_plan(&self, cpu: u32, memory_gb: u32) -> Result<ServerPlan>;

    async fn create_server(&self, req: &ServerRequest) -> Result<ServerSummary>;

    /// Create a network interface attached to `server_id`.
    async fn create_interface(&self, server_id: ResourceId) -> Result<Interface>;

    async fn connect_to_shared_segment(&self, interface_id: ResourceId) -> Result<()>;

    async fn configure_disk(&self, disk_id: ResourceId, edit: &DiskEdit) -> Result<()>;

    async fn connect_disk(&self, disk_id: ResourceId, server_id: ResourceId) -> Result<()>;

    async fn disconnect_disk(&self, disk_id: ResourceId) -> Result<()>;

    async fn boot_server(&self, server_id: ResourceId) -> Result<()>;

    async fn stop_server(&self, server_id: ResourceId) -> Result<()>;

    async fn power_state(&self, server_id: ResourceId) -> Result<PowerState>;

    async fn delete_server(&self, server_id: ResourceId) -> Result<()>;

    async fn delete_disk(&self, disk_id: ResourceId) -> Result<()>;
}
