//! First-time creation of the disk, server and network attachment.

use tracing::{debug, info};

use crate::config::ProvisioningSpec;
use crate::error::VmError;
use crate::lifecycle::{self, BOOT_STEPS};
use crate::locate::locate;
use crate::progress::{OutputMode, Step, StepProgress};
use crate::provider::{
    Availability, CloudProvider, DiskEdit, DiskPlan, DiskRequest, ProviderError, ResourceId,
    ServerRequest,
};
use crate::vm_state::ResourceDescriptor;
use crate::wait::{WaitError, WaitPolicy, wait_until};

pub const PROVISION_STEPS: usize = 8;

const NOTE_LIMIT: u32 = 1;

/// Ids of everything a successful provision created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub server_id: ResourceId,
    pub disk_id: ResourceId,
    pub interface_id: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Provisioned),
    AlreadyExists,
}

/// Provision only when `current` is the absent sentinel.
pub async fn create_if_absent(
    provider: &impl CloudProvider,
    spec: &ProvisioningSpec,
    current: &ResourceDescriptor,
    progress: &mut StepProgress,
) -> Result<CreateOutcome, VmError> {
    if !current.is_absent() {
        info!(server_id = current.instance_id, "server already exists, nothing to create");
        progress.info(&format!(
            "server '{}' already exists (serverID {})",
            spec.hostname, current.instance_id
        ));
        return Ok(CreateOutcome::AlreadyExists);
    }
    provision(provider, spec, progress)
        .await
        .map(CreateOutcome::Created)
}

/// The `--create` action. Returns the descriptor of the server that now
/// exists. A fresh server is booted when `autoBoot` is set, unless an
/// explicit boot follows in the same run.
pub async fn create(
    provider: &impl CloudProvider,
    spec: &ProvisioningSpec,
    current: ResourceDescriptor,
    boot_follows: bool,
    mode: OutputMode,
) -> Result<ResourceDescriptor, VmError> {
    let mut progress = StepProgress::new(PROVISION_STEPS, mode);
    let CreateOutcome::Created(created) =
        create_if_absent(provider, spec, &current, &mut progress).await?
    else {
        return Ok(current);
    };

    let descriptor = locate(provider, &spec.hostname).await?;
    progress.println(&format!("serverID( {} ) is created", created.server_id));

    if spec.auto_boot && !boot_follows {
        let mut progress = StepProgress::new(BOOT_STEPS, mode);
        lifecycle::boot(provider, &descriptor, &spec.hostname, &mut progress).await?;
    }
    Ok(descriptor)
}

/// Create and wire up a new server. Never boots it.
pub async fn provision(
    provider: &impl CloudProvider,
    spec: &ProvisioningSpec,
    progress: &mut StepProgress,
) -> Result<Provisioned, VmError> {
    let password = spec.require_password()?.to_string();
    info!(hostname = %spec.hostname, zone = %spec.zone, "provisioning");

    let archive = progress
        .run("Resolving base image", |step| async move {
            let archive = provider
                .find_latest_stable_archive(spec.os)
                .await
                .map_err(|e| VmError::provider("looking up the base image", e))?;
            step.set_done_label(format!("Base image: {}", archive.name));
            Ok::<_, VmError>(archive)
        })
        .await?;

    let note_name = spec.note.clone();
    let note = progress
        .run("Resolving startup script", |step| async move {
            let notes = provider
                .find_shared_notes(&note_name, NOTE_LIMIT)
                .await
                .map_err(|e| VmError::provider("looking up the startup script", e))?;
            let note = notes.into_iter().next().ok_or_else(|| {
                VmError::provider(
                    "looking up the startup script",
                    ProviderError::NotFound(format!("no shared note matching '{note_name}'")),
                )
            })?;
            step.set_done_label(format!("Startup script: {}", note.name));
            Ok::<_, VmError>(note)
        })
        .await?;

    let disk_req = DiskRequest {
        name: spec.hostname.clone(),
        description: spec.description.clone(),
        tags: vec![spec.tag.clone()],
        plan: DiskPlan::Ssd,
        source_archive: archive.id,
    };
    let disk = progress
        .run("Creating disk", |step| async move {
            let disk = provider
                .create_disk(&disk_req)
                .await
                .map_err(|e| VmError::provider("creating the disk", e))?;
            step.set_done_label(format!("Created disk {}", disk.id));
            Ok::<_, VmError>(disk)
        })
        .await?;
    debug!(disk_id = disk.id, "disk created");

    let server = progress
        .run("Creating server", |step| async move {
            let plan = provider
                .find_server_plan(spec.cpu, spec.mem_gb)
                .await
                .map_err(|e| VmError::provider("matching a server plan", e))?;
            step.log(&format!("plan {} ({} CPU, {} GB)", plan.id, plan.cpu, plan.memory_gb));
            let server = provider
                .create_server(&ServerRequest {
                    name: spec.hostname.clone(),
                    description: spec.description.clone(),
                    tags: vec![spec.tag.clone()],
                    plan_id: plan.id,
                })
                .await
                .map_err(|e| VmError::provider("creating the server", e))?;
            step.set_done_label(format!("Created server {}", server.id));
            Ok::<_, VmError>(server)
        })
        .await?;
    let server_id = server.id;
    debug!(server_id, "server created");

    let interface = progress
        .run("Connecting to the shared segment", |_| async move {
            let interface = provider
                .create_interface(server_id)
                .await
                .map_err(|e| VmError::provider("creating the network interface", e))?;
            provider
                .connect_to_shared_segment(interface.id)
                .await
                .map_err(|e| VmError::provider("connecting to the shared segment", e))?;
            Ok::<_, VmError>(interface)
        })
        .await?;

    let disk_id = disk.id;
    progress
        .run("Waiting for disk copy", |step| async move {
            wait_for_disk_copy(provider, disk_id, &step).await
        })
        .await?;

    let edit = DiskEdit {
        hostname: spec.hostname.clone(),
        password,
        ssh_keys: if spec.ssh_public_key.is_empty() {
            vec![]
        } else {
            vec![spec.ssh_public_key.clone()]
        },
        notes: vec![note.id],
    };
    progress
        .run("Configuring guest", |_| async move {
            provider
                .configure_disk(disk_id, &edit)
                .await
                .map_err(|e| VmError::provider("configuring the disk", e))
        })
        .await?;

    progress
        .run("Attaching disk", |_| async move {
            provider
                .connect_disk(disk_id, server_id)
                .await
                .map_err(|e| VmError::provider("attaching the disk", e))
        })
        .await?;

    info!(server_id, disk_id, "provisioned");
    Ok(Provisioned {
        server_id,
        disk_id,
        interface_id: interface.id,
    })
}

async fn wait_for_disk_copy(
    provider: &impl CloudProvider,
    disk_id: ResourceId,
    step: &Step,
) -> Result<(), VmError> {
    let policy = WaitPolicy::new("disk copy");
    let result = wait_until(&policy, || async move {
        let disk = provider.read_disk(disk_id).await?;
        match disk.availability {
            Availability::Available => Ok::<_, ProviderError>(true),
            Availability::Failed => Err(ProviderError::State(format!(
                "copy into disk {disk_id} failed"
            ))),
            Availability::Migrating => {
                step.log("copying archive...");
                Ok(false)
            }
            Availability::Other(state) => {
                step.log(&format!("disk state: {state}"));
                Ok(false)
            }
        }
    })
    .await;

    match result {
        Ok(elapsed) => {
            step.set_done_label(format!("Disk copy finished in {}s", elapsed.as_secs()));
            Ok(())
        }
        Err(WaitError::TimedOut { .. }) => Err(VmError::Timeout {
            operation: "waiting for disk copy".into(),
            timeout_secs: policy.timeout.as_secs(),
        }),
        Err(WaitError::Check(e)) => Err(VmError::provider("waiting for disk copy", e)),
    }
}
