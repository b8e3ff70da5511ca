use std::io::IsTerminal;

use clap::Parser;
use tracing::{info, warn};

use sacvm::cli::Cli;
use sacvm::config::{self, ProvisioningSpec};
use sacvm::confirm::ConfirmationGate;
use sacvm::error::VmError;
use sacvm::lifecycle::{self, BOOT_STEPS, DELETE_STEPS, DeleteOutcome, STOP_STEPS};
use sacvm::locate::locate;
use sacvm::logging::{self, LogFileHandle};
use sacvm::paths;
use sacvm::progress::{OutputMode, StepProgress};
use sacvm::provider::sakura::SakuraClient;
use sacvm::provision;
use sacvm::remote::{RemoteError, ssh};
use sacvm::vm_state::ResourceDescriptor;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mode = resolve_output_mode(cli.verbose, cli.quiet);
    let log_file = logging::init(mode);

    let code = match run(&cli, mode, &log_file).await {
        Ok(()) => 0,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };

    // A blocked stdin reader thread would otherwise hold up runtime shutdown.
    std::process::exit(code);
}

async fn run(cli: &Cli, mode: OutputMode, log_file: &LogFileHandle) -> Result<(), VmError> {
    let spec = config::load_config(&cli.config)?;
    if cli.create || cli.ssh {
        spec.require_password()?;
    }

    if cli.mutates() {
        let path = paths::log_file(&spec.name);
        if let Err(e) = log_file.activate(&path) {
            warn!(path = %path.display(), error = %e, "could not open log file");
        }
    }

    let provider = SakuraClient::new(&spec.credentials()).map_err(|e| VmError::ProviderClient {
        message: e.to_string(),
    })?;

    let mut descriptor = locate(&provider, &spec.hostname).await?;
    info!(
        hostname = %spec.hostname,
        server_id = descriptor.instance_id,
        address = %descriptor.address,
        disk_id = descriptor.storage_id,
        "resolved server"
    );
    if !cli.any_action() {
        info!("no action requested, reporting the located server");
    }

    if cli.create {
        descriptor = provision::create(&provider, &spec, descriptor, cli.boot, mode).await?;
    }

    if cli.boot {
        let mut progress = StepProgress::new(BOOT_STEPS, mode);
        lifecycle::boot(&provider, &descriptor, &spec.hostname, &mut progress).await?;
    }

    if cli.stop {
        let mut progress = StepProgress::new(STOP_STEPS, mode);
        lifecycle::stop(&provider, &descriptor, &spec.hostname, &mut progress).await?;
    }

    let mut deleted = false;
    if cli.delete {
        let mut progress = StepProgress::new(DELETE_STEPS, mode);
        let mut gate = ConfirmationGate::stdio();
        let outcome =
            lifecycle::delete(&provider, &descriptor, &spec.hostname, &mut gate, &mut progress)
                .await?;
        if outcome == DeleteOutcome::Deleted {
            deleted = true;
            descriptor = ResourceDescriptor::absent();
        }
    }

    // --show has no action of its own; the summary line below covers it.

    if cli.ssh {
        run_shell(&spec, &descriptor).await?;
    }

    if !deleted {
        println!("{}", descriptor.summary_line());
    }
    Ok(())
}

async fn run_shell(spec: &ProvisioningSpec, descriptor: &ResourceDescriptor) -> Result<(), VmError> {
    if descriptor.is_absent() {
        return Err(VmError::NotProvisioned {
            hostname: spec.hostname.clone(),
        });
    }
    if descriptor.address.is_empty() {
        return Err(VmError::Transport {
            source: RemoteError::Dial {
                addr: spec.hostname.clone(),
                message: "the server has no network address".into(),
            },
        });
    }

    match ssh::open_shell(&descriptor.address, spec.require_password()?).await {
        Ok(exit) => match exit.status {
            Some(code) => info!(code, "remote shell exited"),
            None => warn!("connection closed before the shell reported an exit status"),
        },
        Err(e) if e.is_fatal() => return Err(VmError::Transport { source: e }),
        Err(e) => {
            warn!(error = %e, "remote shell ended early");
            eprintln!("ssh: {e}");
        }
    }
    Ok(())
}

/// Spinners on a terminal, plain numbered lines otherwise.
fn resolve_output_mode(verbose: bool, quiet: bool) -> OutputMode {
    let interactive = std::io::stderr().is_terminal() && std::io::stdout().is_terminal();
    if quiet {
        OutputMode::Quiet
    } else if verbose {
        OutputMode::Verbose
    } else if interactive {
        OutputMode::Normal
    } else {
        OutputMode::Plain
    }
}
