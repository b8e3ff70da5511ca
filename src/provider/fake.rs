//! In-memory `CloudProvider` that records every call.

use std::cell::RefCell;

use super::{
    Archive, Availability, CloudProvider, Disk, DiskEdit, DiskRequest, Interface, Note, OsFamily,
    PowerState, ProviderError, ResourceId, Result, ServerPlan, ServerQuery, ServerRequest,
    ServerSummary,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindServers(String),
    FindArchive(OsFamily),
    FindNotes(String),
    CreateDisk(String),
    ReadDisk(ResourceId),
    FindPlan(u32, u32),
    CreateServer(String),
    CreateInterface(ResourceId),
    ConnectShared(ResourceId),
    ConfigureDisk(ResourceId),
    ConnectDisk(ResourceId, ResourceId),
    DisconnectDisk(ResourceId),
    Boot(ResourceId),
    Stop(ResourceId),
    PowerState(ResourceId),
    DeleteServer(ResourceId),
    DeleteDisk(ResourceId),
}

#[derive(Debug, Clone)]
struct FakeServer {
    id: ResourceId,
    name: String,
    addresses: Vec<String>,
    disk_ids: Vec<ResourceId>,
    power: PowerState,
    /// Polls remaining before a stop request takes effect.
    stopping_polls: Option<u32>,
}

#[derive(Debug, Clone)]
struct FakeDisk {
    id: ResourceId,
    edit: Option<DiskEdit>,
    /// Polls remaining before the archive copy completes.
    copy_polls: u32,
    fail_copy: bool,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    servers: Vec<FakeServer>,
    disks: Vec<FakeDisk>,
    /// (interface id, server id, address slot)
    interfaces: Vec<(ResourceId, ResourceId, usize)>,
    next_id: ResourceId,
    fail_on: Option<&'static str>,
    with_note: bool,
}

#[derive(Debug)]
pub struct FakeProvider {
    state: RefCell<State>,
    copy_polls: u32,
    stop_polls: u32,
    fail_copy: bool,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                next_id: 100,
                with_note: true,
                ..Default::default()
            }),
            copy_polls: 0,
            stop_polls: 0,
            fail_copy: false,
        }
    }

    /// Disk copies report "migrating" for this many reads.
    pub fn with_copy_polls(mut self, polls: u32) -> Self {
        self.copy_polls = polls;
        self
    }

    /// Servers keep reporting "up" for this many power reads after a stop.
    pub fn with_stop_polls(mut self, polls: u32) -> Self {
        self.stop_polls = polls;
        self
    }

    pub fn with_failed_copy(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    pub fn without_note(self) -> Self {
        self.state.borrow_mut().with_note = false;
        self
    }

    /// Make the named operation fail with a 500.
    pub fn fail_on(self, operation: &'static str) -> Self {
        self.state.borrow_mut().fail_on = Some(operation);
        self
    }

    /// Seed an existing server with one address and one disk.
    pub fn with_server(self, name: &str, address: &str, disk_id: ResourceId) -> Self {
        {
            let mut st = self.state.borrow_mut();
            let id = st.alloc();
            st.servers.push(FakeServer {
                id,
                name: name.to_string(),
                addresses: vec![address.to_string()],
                disk_ids: if disk_id == 0 { vec![] } else { vec![disk_id] },
                power: PowerState::Down,
                stopping_polls: None,
            });
            if disk_id != 0 {
                st.disks.push(FakeDisk {
                    id: disk_id,
                    edit: None,
                    copy_polls: 0,
                    fail_copy: false,
                });
            }
        }
        self
    }

    /// Seed a server that has no interfaces and no disks.
    pub fn with_bare_server(self, name: &str) -> Self {
        {
            let mut st = self.state.borrow_mut();
            let id = st.alloc();
            st.servers.push(FakeServer {
                id,
                name: name.to_string(),
                addresses: vec![],
                disk_ids: vec![],
                power: PowerState::Down,
                stopping_polls: None,
            });
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Calls that change remote state.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    Call::FindServers(_)
                        | Call::FindArchive(_)
                        | Call::FindNotes(_)
                        | Call::ReadDisk(_)
                        | Call::FindPlan(..)
                        | Call::PowerState(_)
                )
            })
            .collect()
    }

    pub fn server_count(&self) -> usize {
        self.state.borrow().servers.len()
    }

    pub fn disk_count(&self) -> usize {
        self.state.borrow().disks.len()
    }

    pub fn power_of(&self, server_id: ResourceId) -> Option<PowerState> {
        self.state
            .borrow()
            .servers
            .iter()
            .find(|s| s.id == server_id)
            .map(|s| s.power.clone())
    }

    pub fn disk_edit(&self, disk_id: ResourceId) -> Option<DiskEdit> {
        self.state
            .borrow()
            .disks
            .iter()
            .find(|d| d.id == disk_id)
            .and_then(|d| d.edit.clone())
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.calls.push(call);
        if st.fail_on == Some(operation) {
            return Err(ProviderError::Api {
                status: 500,
                message: format!("injected failure in {operation}"),
            });
        }
        Ok(())
    }
}

impl State {
    fn alloc(&mut self) -> ResourceId {
        self.next_id += 1;
        self.next_id
    }

    fn server_mut(&mut self, id: ResourceId) -> Result<&mut FakeServer> {
        self.servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("server {id}")))
    }

    fn disk_mut(&mut self, id: ResourceId) -> Result<&mut FakeDisk> {
        self.disks
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("disk {id}")))
    }
}

fn summary(s: &FakeServer) -> ServerSummary {
    ServerSummary {
        id: s.id,
        name: s.name.clone(),
        addresses: s.addresses.clone(),
        disk_ids: s.disk_ids.clone(),
    }
}

impl CloudProvider for FakeProvider {
    async fn find_servers(&self, query: &ServerQuery) -> Result<Vec<ServerSummary>> {
        self.record(Call::FindServers(query.name_like.clone()), "find_servers")?;
        let st = self.state.borrow();
        Ok(st
            .servers
            .iter()
            .filter(|s| s.name.contains(&query.name_like))
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(summary)
            .collect())
    }

    async fn find_latest_stable_archive(&self, os: OsFamily) -> Result<Archive> {
        self.record(Call::FindArchive(os), "find_latest_stable_archive")?;
        Ok(Archive {
            id: 9000,
            name: format!("{os} stable"),
        })
    }

    async fn find_shared_notes(&self, name_like: &str, limit: u32) -> Result<Vec<Note>> {
        self.record(Call::FindNotes(name_like.to_string()), "find_shared_notes")?;
        let st = self.state.borrow();
        if !st.with_note {
            return Ok(vec![]);
        }
        Ok(vec![Note {
            id: 7000,
            name: name_like.to_string(),
        }]
        .into_iter()
        .take(limit as usize)
        .collect())
    }

    async fn create_disk(&self, req: &DiskRequest) -> Result<Disk> {
        self.record(Call::CreateDisk(req.name.clone()), "create_disk")?;
        let mut st = self.state.borrow_mut();
        let id = st.alloc();
        st.disks.push(FakeDisk {
            id,
            edit: None,
            copy_polls: self.copy_polls,
            fail_copy: self.fail_copy,
        });
        Ok(Disk {
            id,
            availability: Availability::Migrating,
        })
    }

    async fn read_disk(&self, disk_id: ResourceId) -> Result<Disk> {
        self.record(Call::ReadDisk(disk_id), "read_disk")?;
        let mut st = self.state.borrow_mut();
        let disk = st.disk_mut(disk_id)?;
        let availability = if disk.fail_copy {
            Availability::Failed
        } else if disk.copy_polls > 0 {
            disk.copy_polls -= 1;
            Availability::Migrating
        } else {
            Availability::Available
        };
        Ok(Disk {
            id: disk_id,
            availability,
        })
    }

    async fn find_server_plan(&self, cpu: u32, memory_gb: u32) -> Result<ServerPlan> {
        self.record(Call::FindPlan(cpu, memory_gb), "find_server_plan")?;
        Ok(ServerPlan {
            id: 100_000 + i64::from(cpu) * 1000 + i64::from(memory_gb),
            cpu,
            memory_gb,
        })
    }

    async fn create_server(&self, req: &ServerRequest) -> Result<ServerSummary> {
        self.record(Call::CreateServer(req.name.clone()), "create_server")?;
        let mut st = self.state.borrow_mut();
        let id = st.alloc();
        let server = FakeServer {
            id,
            name: req.name.clone(),
            addresses: vec![],
            disk_ids: vec![],
            power: PowerState::Down,
            stopping_polls: None,
        };
        let out = summary(&server);
        st.servers.push(server);
        Ok(out)
    }

    async fn create_interface(&self, server_id: ResourceId) -> Result<Interface> {
        self.record(Call::CreateInterface(server_id), "create_interface")?;
        let mut st = self.state.borrow_mut();
        let id = st.alloc();
        let addresses = &mut st.server_mut(server_id)?.addresses;
        addresses.push(String::new());
        let slot = addresses.len() - 1;
        st.interfaces.push((id, server_id, slot));
        Ok(Interface { id })
    }

    async fn connect_to_shared_segment(&self, interface_id: ResourceId) -> Result<()> {
        self.record(Call::ConnectShared(interface_id), "connect_to_shared_segment")?;
        let mut st = self.state.borrow_mut();
        let (_, server_id, slot) = st
            .interfaces
            .iter()
            .copied()
            .find(|(id, _, _)| *id == interface_id)
            .ok_or_else(|| ProviderError::NotFound(format!("interface {interface_id}")))?;
        let server = st.server_mut(server_id)?;
        server.addresses[slot] = format!("203.0.113.{}", interface_id % 250);
        Ok(())
    }

    async fn configure_disk(&self, disk_id: ResourceId, edit: &DiskEdit) -> Result<()> {
        self.record(Call::ConfigureDisk(disk_id), "configure_disk")?;
        let mut st = self.state.borrow_mut();
        st.disk_mut(disk_id)?.edit = Some(edit.clone());
        Ok(())
    }

    async fn connect_disk(&self, disk_id: ResourceId, server_id: ResourceId) -> Result<()> {
        self.record(Call::ConnectDisk(disk_id, server_id), "connect_disk")?;
        let mut st = self.state.borrow_mut();
        st.disk_mut(disk_id)?;
        st.server_mut(server_id)?.disk_ids.push(disk_id);
        Ok(())
    }

    async fn disconnect_disk(&self, disk_id: ResourceId) -> Result<()> {
        self.record(Call::DisconnectDisk(disk_id), "disconnect_disk")?;
        let mut st = self.state.borrow_mut();
        for server in &mut st.servers {
            server.disk_ids.retain(|&d| d != disk_id);
        }
        Ok(())
    }

    async fn boot_server(&self, server_id: ResourceId) -> Result<()> {
        self.record(Call::Boot(server_id), "boot_server")?;
        let mut st = self.state.borrow_mut();
        let server = st.server_mut(server_id)?;
        server.power = PowerState::Up;
        server.stopping_polls = None;
        Ok(())
    }

    async fn stop_server(&self, server_id: ResourceId) -> Result<()> {
        self.record(Call::Stop(server_id), "stop_server")?;
        let polls = self.stop_polls;
        let mut st = self.state.borrow_mut();
        let server = st.server_mut(server_id)?;
        if polls == 0 {
            server.power = PowerState::Down;
        } else {
            server.stopping_polls = Some(polls);
        }
        Ok(())
    }

    async fn power_state(&self, server_id: ResourceId) -> Result<PowerState> {
        self.record(Call::PowerState(server_id), "power_state")?;
        let mut st = self.state.borrow_mut();
        let server = st.server_mut(server_id)?;
        match server.stopping_polls {
            Some(0) => {
                server.power = PowerState::Down;
                server.stopping_polls = None;
            }
            Some(n) => server.stopping_polls = Some(n - 1),
            None => {}
        }
        Ok(server.power.clone())
    }

    async fn delete_server(&self, server_id: ResourceId) -> Result<()> {
        self.record(Call::DeleteServer(server_id), "delete_server")?;
        let mut st = self.state.borrow_mut();
        st.server_mut(server_id)?;
        st.servers.retain(|s| s.id != server_id);
        Ok(())
    }

    async fn delete_disk(&self, disk_id: ResourceId) -> Result<()> {
        self.record(Call::DeleteDisk(disk_id), "delete_disk")?;
        let mut st = self.state.borrow_mut();
        st.disk_mut(disk_id)?;
        st.disks.retain(|d| d.id != disk_id);
        Ok(())
    }
}
