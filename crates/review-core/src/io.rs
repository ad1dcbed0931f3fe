use crate::error::{Result, ReviewError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;

const LOCK_POLL: Duration = Duration::from_millis(25);
/// Longest any writer waits for, or holds, a lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// A lock file untouched for longer than this was left by a dead writer.
const STALE_LOCK_AGE: Duration = LOCK_TIMEOUT;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting reports and registries.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Like [`atomic_write`], but never replaces an existing file. Returns
/// `Ok(false)` when `path` already exists.
pub fn atomic_create(path: &Path, data: &[u8]) -> Result<bool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

// ---------------------------------------------------------------------------
// Exclusive append
// ---------------------------------------------------------------------------

/// Holds `<file>.lock` for as long as it lives.
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

/// Acquire the sibling lock file for `path`, polling until `timeout` elapses.
pub fn acquire_lock(path: &Path, timeout: Duration) -> Result<LockGuard> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    let lock_path = path.with_file_name(name);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let started = Instant::now();
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => return Ok(LockGuard { lock_path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if is_stale(&lock_path) {
                    tracing::warn!(lock = %lock_path.display(), "reclaiming stale lock");
                    match std::fs::remove_file(&lock_path) {
                        Ok(()) => continue,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                if started.elapsed() >= timeout {
                    return Err(ReviewError::LockTimeout(lock_path));
                }
                std::thread::sleep(LOCK_POLL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn is_stale(lock_path: &Path) -> bool {
    std::fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Append `text` to `path`, writing `header` first when the file is missing
/// or empty. The caller must hold the lock for `path`.
///
/// Everything is written with a single `write_all` so concurrent appenders
/// never interleave within a line.
pub fn append_with_header(path: &Path, header: &str, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let data = if f.metadata()?.len() == 0 {
        format!("{header}{text}")
    } else {
        text.to_string()
    };
    f.write_all(data.as_bytes())?;
    f.flush()?;
    Ok(())
}

/// Append `text` to `path` under an exclusive lock, creating the file with
/// `header` if needed.
pub fn append_locked(path: &Path, header: &str, text: &str) -> Result<()> {
    let _guard = acquire_lock(path, LOCK_TIMEOUT)?;
    append_with_header(path, header, text)
}
