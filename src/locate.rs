//! Find the server this project owns.

use tracing::{debug, warn};

use crate::error::VmError;
use crate::provider::{CloudProvider, ServerQuery, ServerSummary};
use crate::vm_state::ResourceDescriptor;

pub const MAX_CANDIDATES: u32 = 5;

const INCLUDE: [&str; 4] = ["Name", "Description", "Interfaces.IPAddress", "Disks"];

pub fn server_query(hostname: &str) -> ServerQuery {
    ServerQuery {
        name_like: hostname.to_string(),
        offset: 0,
        limit: MAX_CANDIDATES,
        include: INCLUDE.to_vec(),
    }
}

/// Resolve the descriptor for `hostname`, or the absent sentinel.
///
/// The search is a substring match. An exact name match wins; otherwise
/// the first candidate in provider order is taken with a warning.
pub async fn locate(
    provider: &impl CloudProvider,
    hostname: &str,
) -> Result<ResourceDescriptor, VmError> {
    let candidates = provider
        .find_servers(&server_query(hostname))
        .await
        .map_err(|e| VmError::provider("searching servers", e))?;

    debug!(hostname, candidates = candidates.len(), "server search");

    let Some(chosen) = pick(&candidates, hostname) else {
        return Ok(ResourceDescriptor::absent());
    };

    Ok(describe(chosen))
}

fn pick<'a>(candidates: &'a [ServerSummary], hostname: &str) -> Option<&'a ServerSummary> {
    if let Some(exact) = candidates.iter().find(|s| s.name == hostname) {
        return Some(exact);
    }
    let first = candidates.first()?;
    let message = ambiguity_warning(hostname, first, candidates.len());
    warn!(hostname, chosen = %first.name, candidates = candidates.len(), "{message}");
    // Terminal tracing is off under spinners, so the operator sees it here.
    eprintln!("warning: {message}");
    Some(first)
}

fn ambiguity_warning(hostname: &str, chosen: &ServerSummary, candidates: usize) -> String {
    format!(
        "no server is named exactly '{hostname}'; using '{}' (serverID {}), the first of {candidates} partial matches",
        chosen.name, chosen.id
    )
}

fn describe(server: &ServerSummary) -> ResourceDescriptor {
    ResourceDescriptor {
        instance_id: server.id,
        address: server.addresses.first().cloned().unwrap_or_default(),
        storage_id: server.disk_ids.first().copied().unwrap_or(0),
    }
}
