use clap::Parser;
use std::path::PathBuf;

/// Actions run in this order, whichever combination is given:
/// create, boot, stop, delete, show, ssh.
#[derive(Parser, Debug)]
#[command(name = "sacvm", about = "Provision and drive a single Sakura Cloud server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show step progress
    #[arg(short, long)]
    pub quiet: bool,

    /// Create the disk and server if they do not exist yet
    #[arg(long)]
    pub create: bool,

    /// Power the server on
    #[arg(long)]
    pub boot: bool,

    /// Power the server off and wait until it is down
    #[arg(long)]
    pub stop: bool,

    /// Delete the server and its disk (asks first)
    #[arg(long)]
    pub delete: bool,

    /// Print the server's address and disk id
    #[arg(long)]
    pub show: bool,

    /// Open an interactive root shell on the server
    #[arg(long)]
    pub ssh: bool,
}

impl Cli {
    /// Whether this run changes remote state.
    pub fn mutates(&self) -> bool {
        self.create || self.boot || self.stop || self.delete
    }

    pub fn any_action(&self) -> bool {
        self.mutates() || self.show || self.ssh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_combine() {
        let cli = Cli::try_parse_from(["sacvm", "--create", "--boot", "--ssh"]).unwrap();
        assert!(cli.create && cli.boot && cli.ssh);
        assert!(!cli.delete);
        assert!(cli.mutates());
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn show_alone_is_read_only() {
        let cli = Cli::try_parse_from(["sacvm", "-c", "other.toml", "--show"]).unwrap();
        assert!(!cli.mutates());
        assert!(cli.any_action());
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["sacvm", "-v", "-q", "--show"]).is_err());
    }
}
