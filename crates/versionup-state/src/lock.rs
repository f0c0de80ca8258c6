use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fd_lock::RwLock;
use tracing::debug;

/// Runs `run` while holding an exclusive advisory lock on `path`.
///
/// Fails fast with `upgrade-locked` when another process holds the lock.
/// The OS drops the lock if the holder dies, so no stale marker is left.
pub fn with_upgrade_lock<T>(path: &Path, run: impl FnOnce() -> Result<T>) -> Result<T> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open upgrade lock: {}", path.display()))?;
    let mut lock = RwLock::new(file);
    let mut guard = match lock.try_write() {
        Ok(guard) => guard,
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
            return Err(anyhow!(
                "upgrade-locked: another upgrade is running (lock: {})",
                path.display()
            ));
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to lock upgrade lock: {}", path.display()));
        }
    };

    guard
        .set_len(0)
        .with_context(|| format!("failed to truncate upgrade lock: {}", path.display()))?;
    writeln!(guard, "{}", std::process::id())
        .with_context(|| format!("failed to write upgrade lock: {}", path.display()))?;
    debug!(lock = %path.display(), "acquired upgrade lock");

    let result = run();
    drop(guard);
    result
}
