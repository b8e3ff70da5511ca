use std::path::PathBuf;

/// Per-server data directory: `~/.local/share/sacvm/<name>/`
pub fn work_dir(name: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("sacvm")
        .join(name)
}

/// Debug log of every mutating run against this server.
pub fn log_file(name: &str) -> PathBuf {
    work_dir(name).join("sacvm.log")
}
