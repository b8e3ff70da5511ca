//! Sakura Cloud v1.1 wire models.
//!
//! Field names follow the API's PascalCase. Ids arrive as JSON numbers
//! when `X-Sakura-Bigint-As-Int` is honoured and as strings otherwise, so
//! every id goes through [`flex_id`].

use serde::{Deserialize, Deserializer, Serialize};

use super::ResourceId;

pub(crate) fn flex_id<'de, D>(deserializer: D) -> Result<ResourceId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(id) => Ok(id),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Lists come back as `null` rather than `[]` when empty.
pub(crate) fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{"ID": ...}` reference used for plans, archives, servers and notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRef {
    #[serde(rename = "ID", deserialize_with = "flex_id")]
    pub id: ResourceId,
}

// ── Find requests ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct FindParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub filter: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
}

// ── Servers ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerList {
    #[serde(default)]
    pub total: u32,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub servers: Vec<ServerBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerBody {
    #[serde(rename = "ID", deserialize_with = "flex_id")]
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub interfaces: Vec<InterfaceBody>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub disks: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceBody {
    #[serde(rename = "ID", deserialize_with = "flex_id")]
    pub id: ResourceId,
    #[serde(rename = "IPAddress", default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerResponse {
    pub server: ServerBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateServerBody {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub server_plan: IdRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateServerRequest {
    pub server: CreateServerBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerResponse {
    pub instance: InstanceBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceBody {
    #[serde(default)]
    pub status: String,
}

// ── Archives, notes, plans ─────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveList {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub archives: Vec<NamedBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NoteList {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub notes: Vec<NamedBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedBody {
    #[serde(rename = "ID", deserialize_with = "flex_id")]
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerPlanList {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub server_plans: Vec<ServerPlanBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerPlanBody {
    #[serde(rename = "ID", deserialize_with = "flex_id")]
    pub id: ResourceId,
    #[serde(rename = "CPU")]
    pub cpu: u32,
    #[serde(rename = "MemoryMB")]
    pub memory_mb: u32,
}

// ── Disks ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDiskBody {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub plan: IdRef,
    pub source_archive: IdRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDiskRequest {
    pub disk: CreateDiskBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskResponse {
    pub disk: DiskBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskBody {
    #[serde(rename = "ID", deserialize_with = "flex_id")]
    pub id: ResourceId,
    #[serde(default)]
    pub availability: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskConfigRequest {
    pub host_name: String,
    pub password: String,
    #[serde(rename = "SSHKeys", skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<SshKeyBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<IdRef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SshKeyBody {
    pub public_key: String,
}

// ── Interfaces ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInterfaceBody {
    pub server: IdRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateInterfaceRequest {
    pub interface: CreateInterfaceBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterfaceResponse {
    pub interface: InterfaceBody,
}
