//! Boot, stop and delete of an existing server.
//!
//! Every operation takes the descriptor by reference and never updates it;
//! callers re-run the locator to observe the new remote state.

use std::time::Duration;

use tracing::{info, warn};

use crate::confirm::Confirm;
use crate::error::VmError;
use crate::progress::StepProgress;
use crate::provider::{CloudProvider, PowerState, ProviderError};
use crate::vm_state::{LifecycleState, ResourceDescriptor};
use crate::wait::{WaitError, WaitPolicy, wait_until};

pub const BOOT_STEPS: usize = 1;
pub const STOP_STEPS: usize = 3;
pub const DELETE_STEPS: usize = 3;

/// Pause before a stop so it does not race other in-flight requests.
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

fn require_existing<'a>(
    descriptor: &'a ResourceDescriptor,
    hostname: &str,
) -> Result<&'a ResourceDescriptor, VmError> {
    if descriptor.is_absent() {
        return Err(VmError::NotProvisioned {
            hostname: hostname.to_string(),
        });
    }
    Ok(descriptor)
}

fn cascade(step: &str, completed: &[&str], source: ProviderError) -> VmError {
    warn!(step, error = %source, "delete cascade stopped");
    VmError::CascadeFailed {
        step: step.to_string(),
        completed: completed.join(", "),
        source,
    }
}

fn status_line(id: i64, status: &str) -> String {
    format!("serverID( {id} ) is {status}")
}

/// Start the server. Does not wait for it to come up.
pub async fn boot(
    provider: &impl CloudProvider,
    descriptor: &ResourceDescriptor,
    hostname: &str,
    progress: &mut StepProgress,
) -> Result<LifecycleState, VmError> {
    let id = require_existing(descriptor, hostname)?.instance_id;

    progress
        .run("Booting server", |_| async move {
            provider
                .boot_server(id)
                .await
                .map_err(|e| VmError::provider("booting the server", e))
        })
        .await?;

    info!(server_id = id, "boot requested");
    progress.println(&status_line(id, "UP"));
    Ok(LifecycleState::Active)
}

/// Settle, request a stop, then poll until the server reports down.
pub async fn stop(
    provider: &impl CloudProvider,
    descriptor: &ResourceDescriptor,
    hostname: &str,
    progress: &mut StepProgress,
) -> Result<LifecycleState, VmError> {
    let id = require_existing(descriptor, hostname)?.instance_id;

    progress
        .run("Settling", |_| async {
            tokio::time::sleep(SETTLE_DELAY).await;
            Ok::<_, VmError>(())
        })
        .await?;

    progress
        .run("Stopping server", |_| async move {
            provider
                .stop_server(id)
                .await
                .map_err(|e| VmError::provider("stopping the server", e))
        })
        .await?;

    let policy = WaitPolicy::new("power down");
    progress
        .run("Waiting for power off", |step| async move {
            let step = &step;
            let result = wait_until(&policy, || async move {
                match provider.power_state(id).await? {
                    PowerState::Down => Ok::<_, ProviderError>(true),
                    state => {
                        step.log(&format!("power state: {state:?}"));
                        Ok(false)
                    }
                }
            })
            .await;
            match result {
                Ok(elapsed) => {
                    step.set_done_label(format!("Powered off after {}s", elapsed.as_secs()));
                    Ok(())
                }
                Err(WaitError::TimedOut { .. }) => Err(VmError::Timeout {
                    operation: "waiting for the server to power off".into(),
                    timeout_secs: policy.timeout.as_secs(),
                }),
                Err(WaitError::Check(e)) => Err(VmError::provider("reading power state", e)),
            }
        })
        .await?;

    info!(server_id = id, "server stopped");
    progress.println(&status_line(id, "DOWN"));
    Ok(LifecycleState::Inactive)
}

/// Ask for confirmation, then detach the disk, delete the server and
/// delete the disk, in that order.
///
/// Nothing is rolled back when a step fails. A zero storage id skips
/// both disk steps.
pub async fn delete(
    provider: &impl CloudProvider,
    descriptor: &ResourceDescriptor,
    hostname: &str,
    confirm: &mut impl Confirm,
    progress: &mut StepProgress,
) -> Result<DeleteOutcome, VmError> {
    let descriptor = require_existing(descriptor, hostname)?;
    let server_id = descriptor.instance_id;
    let disk_id = descriptor.storage_id;

    let prompt =
        format!("Is it okay to delete server '{hostname}' (serverID {server_id})? [y/n]");
    if !confirm.confirm(&prompt)? {
        info!(server_id, "delete declined");
        progress.println("Delete cancelled.");
        return Ok(DeleteOutcome::Declined);
    }

    let mut completed: Vec<&str> = Vec::new();

    const DETACH: &str = "detach disk";
    const DELETE_SERVER: &str = "delete server";
    const DELETE_DISK: &str = "delete disk";

    if descriptor.has_storage() {
        progress
            .run("Detaching disk", |_| provider.disconnect_disk(disk_id))
            .await
            .map_err(|e| cascade(DETACH, &completed, e))?;
        completed.push(DETACH);
    } else {
        progress.skip("Detaching disk");
    }

    progress
        .run("Deleting server", |_| provider.delete_server(server_id))
        .await
        .map_err(|e| cascade(DELETE_SERVER, &completed, e))?;
    completed.push(DELETE_SERVER);

    if descriptor.has_storage() {
        progress
            .run("Deleting disk", |_| provider.delete_disk(disk_id))
            .await
            .map_err(|e| cascade(DELETE_DISK, &completed, e))?;
    } else {
        progress.skip("Deleting disk");
    }

    info!(server_id, disk_id, "deleted");
    progress.println(&status_line(server_id, "DELETED"));
    Ok(DeleteOutcome::Deleted)
}
