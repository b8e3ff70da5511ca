//! Sakura Cloud REST client (API v1.1).
//!
//! GET lookups carry their filter as a JSON document in the query string,
//! mutations send JSON bodies. Every request uses HTTP Basic auth with the
//! access token and secret.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::models::{
    ArchiveList, CreateDiskBody, CreateDiskRequest, CreateInterfaceBody, CreateInterfaceRequest,
    CreateServerBody, CreateServerRequest, DiskConfigRequest, DiskResponse, FindParams, IdRef,
    InterfaceResponse, NoteList, PowerResponse, ServerBody, ServerList, ServerPlanList,
    ServerResponse, SshKeyBody,
};
use super::{
    Archive, Availability, CloudProvider, Disk, DiskEdit, DiskRequest, Interface, Note, OsFamily,
    PowerState, ProviderError, ResourceId, Result, ServerPlan, ServerQuery, ServerRequest,
    ServerSummary,
};

pub const DEFAULT_API_ROOT: &str = "https://secure.sakura.ad.jp/cloud/zone";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`SakuraClient`].
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
    pub zone: String,
    pub api_root: String,
}

#[derive(Clone)]
pub struct SakuraClient {
    http: Client,
    base: String,
    token: String,
    secret: String,
}

impl SakuraClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let base = format!(
            "{}/{}/api/cloud/1.1",
            credentials.api_root.trim_end_matches('/'),
            credentials.zone
        );
        Ok(Self {
            http,
            base,
            token: credentials.token.clone(),
            secret: credentials.secret.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{path}", self.base))
            .map_err(|e| ProviderError::State(format!("invalid API url for {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.token, Some(&self.secret))
            .header("X-Sakura-Bigint-As-Int", "1")
    }

    async fn find<T: DeserializeOwned>(&self, path: &str, params: &FindParams) -> Result<T> {
        let mut url = self.url(path)?;
        url.set_query(Some(&find_query(params)?));
        debug!(%url, "GET request");

        let response = self.request(Method::GET, url).send().await?;
        Self::handle_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "GET request");

        let response = self.request(Method::GET, url).send().await?;
        Self::handle_response(response).await
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.url(path)?;
        debug!(%url, %method, "JSON request");

        let response = self.request(method, url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Request whose response body carries nothing we need.
    async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        let url = self.url(path)?;
        debug!(%url, %method, "request (empty response)");

        let response = self.request(method, url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(Self::error_for(status, text))
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "failed to parse response");
                ProviderError::Decode(e)
            })
        } else {
            Err(Self::error_for(status, text))
        }
    }

    fn error_for(status: StatusCode, text: String) -> ProviderError {
        if status == StatusCode::NOT_FOUND {
            ProviderError::NotFound(text)
        } else {
            ProviderError::Api {
                status: status.as_u16(),
                message: text,
            }
        }
    }

    fn summarize(server: ServerBody) -> ServerSummary {
        ServerSummary {
            id: server.id,
            name: server.name,
            addresses: server
                .interfaces
                .into_iter()
                .map(|iface| iface.ip_address.unwrap_or_default())
                .collect(),
            disk_ids: server.disks.into_iter().map(|d| d.id).collect(),
        }
    }
}

/// The filter document, percent-encoded as the whole query string.
fn find_query(params: &FindParams) -> Result<String> {
    let json = serde_json::to_string(params)?;
    Ok(url::form_urlencoded::byte_serialize(json.as_bytes()).collect())
}

fn filter(entries: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match entries {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

impl CloudProvider for SakuraClient {
    async fn find_servers(&self, query: &ServerQuery) -> Result<Vec<ServerSummary>> {
        let params = FindParams {
            from: Some(query.offset),
            count: Some(query.limit),
            filter: filter(json!({ "Name": query.name_like })),
            include: query.include.iter().map(|s| s.to_string()).collect(),
        };
        let list: ServerList = self.find("/server", &params).await?;
        debug!(total = list.total, "server search complete");
        Ok(list.servers.into_iter().map(Self::summarize).collect())
    }

    async fn find_latest_stable_archive(&self, os: OsFamily) -> Result<Archive> {
        let params = FindParams {
            filter: filter(json!({ "Tags.Name": [["current-stable", os.distro_tag()]] })),
            ..Default::default()
        };
        let list: ArchiveList = self.find("/archive", &params).await?;
        list.archives
            .into_iter()
            .next()
            .map(|a| Archive {
                id: a.id,
                name: a.name,
            })
            .ok_or_else(|| ProviderError::NotFound(format!("no current-stable {os} archive")))
    }

    async fn find_shared_notes(&self, name_like: &str, limit: u32) -> Result<Vec<Note>> {
        let params = FindParams {
            count: Some(limit),
            filter: filter(json!({ "Name": name_like, "Scope": "shared" })),
            ..Default::default()
        };
        let list: NoteList = self.find("/note", &params).await?;
        Ok(list
            .notes
            .into_iter()
            .map(|n| Note {
                id: n.id,
                name: n.name,
            })
            .collect())
    }

    async fn create_disk(&self, req: &DiskRequest) -> Result<Disk> {
        let body = CreateDiskRequest {
            disk: CreateDiskBody {
                name: req.name.clone(),
                description: req.description.clone(),
                tags: req.tags.clone(),
                plan: IdRef { id: req.plan.id() },
                source_archive: IdRef {
                    id: req.source_archive,
                },
            },
        };
        let resp: DiskResponse = self.send_json(Method::POST, "/disk", &body).await?;
        Ok(Disk {
            id: resp.disk.id,
            availability: Availability::parse(&resp.disk.availability),
        })
    }

    async fn read_disk(&self, disk_id: ResourceId) -> Result<Disk> {
        let resp: DiskResponse = self.get(&format!("/disk/{disk_id}")).await?;
        Ok(Disk {
            id: resp.disk.id,
            availability: Availability::parse(&resp.disk.availability),
        })
    }

    async fn find_server_plan(&self, cpu: u32, memory_gb: u32) -> Result<ServerPlan> {
        let memory_mb = memory_gb.checked_mul(1024).ok_or_else(|| {
            ProviderError::State(format!("{memory_gb} GB does not fit a server plan lookup"))
        })?;
        let params = FindParams {
            filter: filter(json!({ "CPU": cpu, "MemoryMB": memory_mb })),
            ..Default::default()
        };
        let list: ServerPlanList = self.find("/product/server", &params).await?;
        list.server_plans
            .into_iter()
            .next()
            .map(|p| ServerPlan {
                id: p.id,
                cpu: p.cpu,
                memory_gb: p.memory_mb / 1024,
            })
            .ok_or_else(|| {
                ProviderError::NotFound(format!("no server plan with {cpu} CPU / {memory_gb} GB"))
            })
    }

    async fn create_server(&self, req: &ServerRequest) -> Result<ServerSummary> {
        let body = CreateServerRequest {
            server: CreateServerBody {
                name: req.name.clone(),
                description: req.description.clone(),
                tags: req.tags.clone(),
                server_plan: IdRef { id: req.plan_id },
            },
        };
        let resp: ServerResponse = self.send_json(Method::POST, "/server", &body).await?;
        Ok(Self::summarize(resp.server))
    }

    async fn create_interface(&self, server_id: ResourceId) -> Result<Interface> {
        let body = CreateInterfaceRequest {
            interface: CreateInterfaceBody {
                server: IdRef { id: server_id },
            },
        };
        let resp: InterfaceResponse = self.send_json(Method::POST, "/interface", &body).await?;
        Ok(Interface {
            id: resp.interface.id,
        })
    }

    async fn connect_to_shared_segment(&self, interface_id: ResourceId) -> Result<()> {
        self.send_empty(Method::PUT, &format!("/interface/{interface_id}/to/switch/shared"))
            .await
    }

    async fn configure_disk(&self, disk_id: ResourceId, edit: &DiskEdit) -> Result<()> {
        let body = DiskConfigRequest {
            host_name: edit.hostname.clone(),
            password: edit.password.clone(),
            ssh_keys: edit
                .ssh_keys
                .iter()
                .map(|k| SshKeyBody {
                    public_key: k.clone(),
                })
                .collect(),
            notes: edit.notes.iter().map(|&id| IdRef { id }).collect(),
        };
        let _: serde_json::Value = self
            .send_json(Method::PUT, &format!("/disk/{disk_id}/config"), &body)
            .await?;
        Ok(())
    }

    async fn connect_disk(&self, disk_id: ResourceId, server_id: ResourceId) -> Result<()> {
        self.send_empty(Method::PUT, &format!("/disk/{disk_id}/to/server/{server_id}"))
            .await
    }

    async fn disconnect_disk(&self, disk_id: ResourceId) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/disk/{disk_id}/to/server"))
            .await
    }

    async fn boot_server(&self, server_id: ResourceId) -> Result<()> {
        self.send_empty(Method::PUT, &format!("/server/{server_id}/power"))
            .await
    }

    async fn stop_server(&self, server_id: ResourceId) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/server/{server_id}/power"))
            .await
    }

    async fn power_state(&self, server_id: ResourceId) -> Result<PowerState> {
        let resp: PowerResponse = self.get(&format!("/server/{server_id}/power")).await?;
        Ok(PowerState::parse(&resp.instance.status))
    }

    async fn delete_server(&self, server_id: ResourceId) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/server/{server_id}"))
            .await
    }

    async fn delete_disk(&self, disk_id: ResourceId) -> Result<()> {
        self.send_empty(Method::DELETE, &format!("/disk/{disk_id}"))
            .await
    }
}
