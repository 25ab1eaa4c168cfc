//! Advisory per-run-directory lock (§5 ownership).
//!
//! The run directory is exclusively owned by the active workflow; concurrent
//! workflows on the same run are not permitted. This lock enforces that with
//! an atomically-created lock file plus an OS file-descriptor lock, and
//! detects stale locks left behind by a crashed process.

use anyhow::Result;
use camino::Utf8PathBuf;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_RUNS_BASE: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Default age threshold for considering a lock stale (in seconds).
const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600; // 1 hour

/// Lock information stored in the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that created the lock.
    pub pid: u32,
    /// Timestamp when the lock was created (seconds since UNIX epoch).
    pub created_at: u64,
    /// Run ID being locked.
    pub run_id: String,
    /// dcmrelay version that created the lock.
    pub dcmrelay_version: String,
}

/// Lock errors for file locking operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Concurrent execution detected for run '{run_id}' (PID {pid}, created {created_ago} ago)"
    )]
    ConcurrentExecution {
        run_id: String,
        pid: u32,
        created_ago: String,
    },

    #[error(
        "Stale lock detected for run '{run_id}' (PID {pid}, age {age_secs}s). Use --force to override"
    )]
    StaleLock {
        run_id: String,
        pid: u32,
        age_secs: u64,
    },

    #[error("Lock file is corrupted or invalid: {reason}")]
    CorruptedLock { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Failed to release lock: {reason}")]
    ReleaseFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Get the base directory under which run directories live.
///
/// Defaults to `./runs`, overridable via `DCMRELAY_RUNS_BASE`; tests use a
/// thread-local override to avoid process-global environment races.
fn runs_base() -> Utf8PathBuf {
    if let Some(tl) = THREAD_RUNS_BASE.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("DCMRELAY_RUNS_BASE") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from("runs")
}

/// Directory for a given run ID, i.e. `<runs_base>/<run_id>`.
fn run_root(run_id: &str) -> Utf8PathBuf {
    runs_base().join(run_id)
}

fn ensure_dir_all(path: &Utf8PathBuf) -> Result<(), io::Error> {
    if !path.as_std_path().exists() {
        fs::create_dir_all(path.as_std_path())?;
    }
    Ok(())
}

/// Set a thread-local override for the runs base directory during tests.
#[cfg(any(test, feature = "test-utils"))]
pub fn set_thread_runs_base_for_tests(path: Utf8PathBuf) {
    THREAD_RUNS_BASE.with(|tl| *tl.borrow_mut() = Some(path));
}

/// Set up an isolated runs-base directory for testing.
#[cfg(test)]
pub fn with_isolated_runs_base() -> tempfile::TempDir {
    let td = tempfile::TempDir::new().expect("Failed to create temp dir");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    set_thread_runs_base_for_tests(p);
    td
}

/// File lock manager for run directories.
pub struct FileLock {
    lock_path: PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    lock_info: LockInfo,
}

impl FileLock {
    /// Attempt to acquire an exclusive lock for the given run ID.
    ///
    /// Uses atomic `create_new` semantics to prevent TOCTOU race conditions.
    /// If the lock file already exists, validates the existing lock before
    /// deciding whether to override it.
    pub fn acquire(run_id: &str, force: bool, ttl_seconds: Option<u64>) -> Result<Self, LockError> {
        let run_root = run_root(run_id);

        ensure_dir_all(&run_root).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to create run directory: {e}"),
        })?;

        let lock_path = Self::get_lock_path(run_id);
        let ttl = ttl_seconds.unwrap_or(DEFAULT_STALE_THRESHOLD_SECS);

        Self::acquire_with_retry(run_id, &lock_path, force, ttl, 3)
    }

    fn acquire_with_retry(
        run_id: &str,
        lock_path: &Path,
        force: bool,
        ttl_seconds: u64,
        max_retries: u32,
    ) -> Result<Self, LockError> {
        for attempt in 0..max_retries {
            let lock_info = LockInfo {
                pid: process::id(),
                created_at: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs(),
                run_id: run_id.to_string(),
                dcmrelay_version: env!("CARGO_PKG_VERSION").to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(lock_path)
            {
                Ok(lock_file) => {
                    return Self::finalize_lock(lock_path.to_path_buf(), lock_file, lock_info);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    match Self::check_existing_lock(lock_path, run_id, force, ttl_seconds) {
                        Ok(()) => match Self::try_remove_stale_lock(lock_path, run_id) {
                            Ok(()) => match fs::OpenOptions::new()
                                .create_new(true)
                                .write(true)
                                .open(lock_path)
                            {
                                Ok(lock_file) => {
                                    return Self::finalize_lock(
                                        lock_path.to_path_buf(),
                                        lock_file,
                                        lock_info,
                                    );
                                }
                                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                                    if attempt + 1 < max_retries {
                                        let base_delay_ms =
                                            10u64.saturating_mul(2u64.saturating_pow(attempt));
                                        let jitter_ms = ((attempt as u64)
                                            .wrapping_mul(3)
                                            .wrapping_add((process::id() as u64) % 7))
                                            % 7;
                                        let delay_ms = base_delay_ms.saturating_add(jitter_ms);
                                        std::thread::sleep(std::time::Duration::from_millis(
                                            delay_ms.min(100),
                                        ));
                                        continue;
                                    }
                                    return Err(LockError::AcquisitionFailed {
                                        reason: format!(
                                            "Max retries exceeded for run '{run_id}': another process acquired lock immediately after stale removal"
                                        ),
                                    });
                                }
                                Err(e) => {
                                    return Err(LockError::AcquisitionFailed {
                                        reason: format!(
                                            "Failed to create lock for run '{run_id}' after removing stale lock: {e}"
                                        ),
                                    });
                                }
                            },
                            Err(e) => return Err(e),
                        },
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!(
                            "Failed to create lock file for run '{}' at '{}': {e}",
                            run_id,
                            lock_path.display()
                        ),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!(
                "Max retries ({max_retries}) exceeded for lock acquisition on run '{run_id}'"
            ),
        })
    }

    fn finalize_lock(
        lock_path: PathBuf,
        lock_file: fs::File,
        lock_info: LockInfo,
    ) -> Result<Self, LockError> {
        let lock_json =
            serde_json::to_string_pretty(&lock_info).map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to serialize lock info for run '{}': {e}", lock_info.run_id),
            })?;

        let mut rw_lock = Box::new(RwLock::new(lock_file));
        {
            let fd_lock = rw_lock
                .try_write()
                .map_err(|_e| LockError::ConcurrentExecution {
                    run_id: lock_info.run_id.clone(),
                    pid: 0,
                    created_ago: "unknown".to_string(),
                })?;

            let mut file_ref = &*fd_lock;
            file_ref
                .write_all(lock_json.as_bytes())
                .map_err(|e| LockError::AcquisitionFailed {
                    reason: format!("Failed to write lock info for run '{}': {e}", lock_info.run_id),
                })?;
            file_ref.flush().map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to flush lock file for run '{}': {e}", lock_info.run_id),
            })?;
            file_ref.sync_all().map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to sync lock file for run '{}': {e}", lock_info.run_id),
            })?;
        }

        Ok(Self {
            lock_path,
            _fd_lock: Some(rw_lock),
            lock_info,
        })
    }

    /// Remove a stale lock file atomically. Treats `NotFound` as success since
    /// another process may already have removed it.
    fn try_remove_stale_lock(lock_path: &Path, run_id: &str) -> Result<(), LockError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let pid = process::id();
        let stale_path = lock_path.with_extension(format!("stale.{timestamp}.{pid}"));

        match fs::rename(lock_path, &stale_path) {
            Ok(()) => {
                let _ = fs::remove_file(&stale_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::AcquisitionFailed {
                reason: format!("Failed to rename stale lock for run '{run_id}': {e}"),
            }),
        }
    }

    #[must_use]
    pub fn exists(run_id: &str) -> bool {
        Self::get_lock_path(run_id).exists()
    }

    pub fn get_lock_info(run_id: &str) -> Result<Option<LockInfo>, LockError> {
        let lock_path = Self::get_lock_path(run_id);

        if !lock_path.exists() {
            return Ok(None);
        }

        let lock_content =
            fs::read_to_string(&lock_path).map_err(|e| LockError::CorruptedLock {
                reason: format!("Failed to read lock file: {e}"),
            })?;

        let lock_info: LockInfo =
            serde_json::from_str(&lock_content).map_err(|e| LockError::CorruptedLock {
                reason: format!("Failed to parse lock file: {e}"),
            })?;

        Ok(Some(lock_info))
    }

    /// Release the lock. Also happens automatically on drop.
    pub fn release(mut self) -> Result<(), LockError> {
        self._fd_lock.take();

        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).map_err(|e| LockError::ReleaseFailed {
                reason: format!("Failed to remove lock file: {e}"),
            })?;
        }

        Ok(())
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.lock_info.run_id
    }

    #[must_use]
    pub const fn lock_info(&self) -> &LockInfo {
        &self.lock_info
    }

    fn get_lock_path(run_id: &str) -> PathBuf {
        run_root(run_id).as_std_path().join(".lock")
    }

    /// Check an existing lock and determine if it should be overridden.
    ///
    /// Retries on empty/partial reads to handle the case where another
    /// process has just created the file but hasn't written content yet.
    fn check_existing_lock(
        lock_path: &Path,
        run_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        const MAX_READ_RETRIES: u32 = 3;
        const READ_RETRY_DELAY_MS: u64 = 10;

        for attempt in 0..MAX_READ_RETRIES {
            let lock_content = match fs::read_to_string(lock_path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    if attempt + 1 < MAX_READ_RETRIES {
                        std::thread::sleep(std::time::Duration::from_millis(READ_RETRY_DELAY_MS));
                        continue;
                    }
                    return Err(LockError::CorruptedLock {
                        reason: format!("Failed to read existing lock for run '{run_id}': {e}"),
                    });
                }
            };

            if lock_content.is_empty() {
                if attempt + 1 < MAX_READ_RETRIES {
                    std::thread::sleep(std::time::Duration::from_millis(READ_RETRY_DELAY_MS));
                    continue;
                }
                return Err(LockError::CorruptedLock {
                    reason: format!("Lock file for run '{run_id}' is empty (may be initializing)"),
                });
            }

            match serde_json::from_str::<LockInfo>(&lock_content) {
                Ok(existing_lock) => {
                    return Self::validate_existing_lock(&existing_lock, run_id, force, ttl_seconds);
                }
                Err(e) => {
                    let is_likely_incomplete = e.is_eof()
                        || lock_content.trim().is_empty()
                        || (lock_content.starts_with('{') && !lock_content.contains('}'));

                    if is_likely_incomplete && attempt + 1 < MAX_READ_RETRIES {
                        std::thread::sleep(std::time::Duration::from_millis(READ_RETRY_DELAY_MS));
                        continue;
                    }

                    return Err(LockError::CorruptedLock {
                        reason: format!("Failed to parse existing lock for run '{run_id}': {e}"),
                    });
                }
            }
        }
        unreachable!("check_existing_lock loop exhausted without returning")
    }

    fn validate_existing_lock(
        existing_lock: &LockInfo,
        run_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let lock_age = now_secs.saturating_sub(existing_lock.created_at);
        let is_stale = lock_age > ttl_seconds;

        if Self::is_process_running(existing_lock.pid) {
            if !force {
                let created_ago = Self::format_duration_since(existing_lock.created_at);
                return Err(LockError::ConcurrentExecution {
                    run_id: run_id.to_string(),
                    pid: existing_lock.pid,
                    created_ago,
                });
            }
            return Ok(());
        }

        if is_stale {
            if force {
                Ok(())
            } else {
                Err(LockError::StaleLock {
                    run_id: run_id.to_string(),
                    pid: existing_lock.pid,
                    age_secs: lock_age,
                })
            }
        } else if force {
            Ok(())
        } else {
            let created_ago = Self::format_duration_since(existing_lock.created_at);
            Err(LockError::ConcurrentExecution {
                run_id: run_id.to_string(),
                pid: existing_lock.pid,
                created_ago,
            })
        }
    }

    /// Check if a process with the given PID is still running.
    fn is_process_running(pid: u32) -> bool {
        #[cfg(unix)]
        {
            let rc = unsafe { libc::kill(pid as i32, 0) };
            if rc == 0 {
                true
            } else {
                matches!(
                    io::Error::last_os_error().raw_os_error(),
                    Some(code) if code == libc::EPERM
                )
            }
        }

        #[cfg(windows)]
        {
            use winapi::um::handleapi::CloseHandle;
            use winapi::um::minwinbase::STILL_ACTIVE;
            use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
            use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

            unsafe {
                let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
                if handle.is_null() {
                    return false;
                }

                let mut exit_code: u32 = 0;
                let result = GetExitCodeProcess(handle, &mut exit_code);

                if result == 0 {
                    CloseHandle(handle);
                    return false;
                }

                CloseHandle(handle);
                exit_code == STILL_ACTIVE
            }
        }

        #[cfg(not(any(unix, windows)))]
        {
            true
        }
    }

    fn format_duration_since(timestamp: u64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let duration = now.saturating_sub(timestamp);

        if duration < 60 {
            format!("{duration}s")
        } else if duration < 3600 {
            format!("{}m", duration / 60)
        } else if duration < 86400 {
            format!("{}h", duration / 3600)
        } else {
            format!("{}d", duration / 86400)
        }
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("lock_path", &self.lock_path)
            .field("lock_info", &self.lock_info)
            .field("_fd_lock", &"<RwLock>")
            .finish()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        if self.lock_path.exists() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

/// Utility functions for lock management, used by the CLI's clean/status
/// surfaces.
pub mod utils {
    use super::{
        DEFAULT_STALE_THRESHOLD_SECS, FileLock, LockError, Result, SystemTime, UNIX_EPOCH, fs,
    };

    /// Check if a clean operation should be allowed (no active lock unless
    /// forced).
    pub fn can_clean(run_id: &str, force: bool, ttl_seconds: Option<u64>) -> Result<(), LockError> {
        let ttl = ttl_seconds.unwrap_or(DEFAULT_STALE_THRESHOLD_SECS);
        if let Some(lock_info) = FileLock::get_lock_info(run_id)? {
            if FileLock::is_process_running(lock_info.pid) {
                if force {
                    return Ok(());
                }
                return Err(LockError::ConcurrentExecution {
                    run_id: run_id.to_string(),
                    pid: lock_info.pid,
                    created_ago: FileLock::format_duration_since(lock_info.created_at),
                });
            }

            if !force {
                let lock_age = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs()
                    - lock_info.created_at;

                if lock_age <= ttl {
                    return Err(LockError::StaleLock {
                        run_id: run_id.to_string(),
                        pid: lock_info.pid,
                        age_secs: lock_age,
                    });
                }
            }
        }

        Ok(())
    }

    /// Force remove a lock file (for emergency cleanup).
    pub fn force_remove_lock(run_id: &str) -> Result<(), LockError> {
        let lock_path = FileLock::get_lock_path(run_id);

        if lock_path.exists() {
            fs::remove_file(&lock_path).map_err(|e| LockError::ReleaseFailed {
                reason: format!("Failed to force remove lock: {e}"),
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use tempfile::TempDir;

    fn setup_test_env() -> TempDir {
        with_isolated_runs_base()
    }

    #[test]
    fn test_lock_acquisition_and_release() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-acquisition-123";

        let lock = FileLock::acquire(run_id, false, None).unwrap();
        assert_eq!(lock.run_id(), run_id);

        let lock_path = FileLock::get_lock_path(run_id);
        assert!(lock_path.exists(), "Lock file should exist at: {lock_path:?}");
        assert!(FileLock::exists(run_id));

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());

        lock.release().unwrap();
        assert!(!FileLock::exists(run_id));

        let _lock2 = FileLock::acquire(run_id, false, None).unwrap();
    }

    #[test]
    fn test_lock_info_serialization() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-serialization-456";
        let _lock = FileLock::acquire(run_id, false, None).unwrap();

        let lock_info = FileLock::get_lock_info(run_id).unwrap().unwrap();
        assert_eq!(lock_info.run_id, run_id);
        assert_eq!(lock_info.pid, process::id());
        assert!(!lock_info.dcmrelay_version.is_empty());
    }

    #[test]
    fn test_automatic_cleanup_on_drop() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-cleanup-789";

        {
            let _lock = FileLock::acquire(run_id, false, None).unwrap();
            assert!(FileLock::exists(run_id));
        }

        assert!(!FileLock::exists(run_id));
    }

    #[test]
    fn test_force_override_stale_lock() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-stale-override";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let old_lock_info = LockInfo {
            pid: 99999,
            created_at: 0,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&old_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), LockError::StaleLock { .. }));

        let lock = FileLock::acquire(run_id, true, None).unwrap();
        assert_eq!(lock.run_id(), run_id);
    }

    #[test]
    fn test_clean_operation_checks() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-clean-checks";

        assert!(utils::can_clean(run_id, false, None).is_ok());

        let _lock = FileLock::acquire(run_id, false, None).unwrap();

        let result = utils::can_clean(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::ConcurrentExecution { .. }
        ));

        assert!(utils::can_clean(run_id, true, None).is_ok());
    }

    #[test]
    fn test_lock_path_generation() {
        let _temp_dir = setup_test_env();

        let run_id = "my-test-run";
        let expected_path = run_root(run_id).as_std_path().join(".lock");
        assert_eq!(FileLock::get_lock_path(run_id), expected_path);
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(
            FileLock::format_duration_since(
                SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 30
            ),
            "30s"
        );
        assert_eq!(
            FileLock::format_duration_since(
                SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 120
            ),
            "2m"
        );
        assert_eq!(
            FileLock::format_duration_since(
                SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 7200
            ),
            "2h"
        );
    }

    #[test]
    fn test_configurable_ttl_parameter() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-configurable-ttl";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let two_minutes_ago =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 120;

        let old_lock_info = LockInfo {
            pid: 99999,
            created_at: two_minutes_ago,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&old_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, false, Some(60));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), LockError::StaleLock { .. }));

        let result = FileLock::acquire(run_id, false, Some(180));
        assert!(result.is_err());

        let lock = FileLock::acquire(run_id, true, Some(60)).unwrap();
        assert_eq!(lock.run_id(), run_id);
    }

    #[test]
    fn test_stale_lock_detection_by_age() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-stale-by-age";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let two_hours_ago =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 7200;

        let old_lock_info = LockInfo {
            pid: 99999,
            created_at: two_hours_ago,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&old_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), LockError::StaleLock { .. }));

        let lock = FileLock::acquire(run_id, true, None).unwrap();
        assert_eq!(lock.run_id(), run_id);
    }

    #[test]
    fn test_stale_lock_detection_by_dead_process() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-stale-by-pid";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let recent_time = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() - 60;

        let old_lock_info = LockInfo {
            pid: 99999,
            created_at: recent_time,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&old_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());

        let lock = FileLock::acquire(run_id, true, None).unwrap();
        assert_eq!(lock.run_id(), run_id);
    }

    #[test]
    fn test_concurrent_execution_detection() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-concurrent";

        let _lock1 = FileLock::acquire(run_id, false, None).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::ConcurrentExecution { .. }
        ));

        let result = FileLock::acquire(run_id, true, None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_lock_release_on_normal_exit() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-normal-exit";

        let lock = FileLock::acquire(run_id, false, None).unwrap();
        assert!(FileLock::exists(run_id));

        lock.release().unwrap();

        assert!(!FileLock::exists(run_id));

        let _lock2 = FileLock::acquire(run_id, false, None).unwrap();
    }

    #[test]
    fn test_lock_cleanup_on_panic() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-panic-cleanup";

        {
            let _lock = FileLock::acquire(run_id, false, None).unwrap();
            assert!(FileLock::exists(run_id));
        }

        assert!(!FileLock::exists(run_id));
    }

    #[test]
    fn test_force_flag_breaks_stale_lock() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-force-break";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let old_lock_info = LockInfo {
            pid: 99999,
            created_at: 0,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&old_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());

        let lock = FileLock::acquire(run_id, true, None).unwrap();
        assert_eq!(lock.run_id(), run_id);

        let new_lock_info = FileLock::get_lock_info(run_id).unwrap().unwrap();
        assert_eq!(new_lock_info.pid, process::id());
    }

    #[test]
    fn test_lock_info_with_invalid_pid() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-invalid-pid";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let invalid_lock_info = LockInfo {
            pid: 0,
            created_at: SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs(),
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&invalid_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, true, None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_lock_info_roundtrip() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-info-roundtrip";
        let lock = FileLock::acquire(run_id, false, None).unwrap();
        let lock_info = lock.lock_info();

        assert_eq!(lock_info.run_id, run_id);
        assert_eq!(lock_info.pid, process::id());
        assert!(!lock_info.dcmrelay_version.is_empty());
    }

    #[test]
    fn test_lock_with_corrupted_lock_file() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-corrupted-lock";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        fs::write(&lock_path, "{ invalid json content }").unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::CorruptedLock { .. }
        ));

        // Force doesn't bypass corrupted-lock detection, only stale-lock detection.
        let result_force = FileLock::acquire(run_id, true, None);
        assert!(result_force.is_err());
        assert!(matches!(
            result_force.unwrap_err(),
            LockError::CorruptedLock { .. }
        ));
    }

    #[test]
    fn test_lock_with_partial_json() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-partial-json";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        fs::write(&lock_path, r#"{"pid": 12345, "created_at":"#).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::CorruptedLock { .. }
        ));
    }

    #[test]
    fn test_lock_with_wrong_json_structure() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-wrong-structure";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        fs::write(&lock_path, r#"["not", "a", "lock", "object"]"#).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::CorruptedLock { .. }
        ));
    }

    #[test]
    fn test_lock_with_missing_required_fields() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-missing-fields";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        fs::write(&lock_path, r#"{"pid": 12345}"#).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::CorruptedLock { .. }
        ));
    }

    #[test]
    fn test_lock_with_extra_fields() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-extra-fields";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let lock_info_json = r#"{
            "pid": 12345,
            "created_at": 0,
            "run_id": "test-run-extra-fields",
            "dcmrelay_version": "0.1.0",
            "extra_field": "should be ignored"
        }"#;

        fs::write(&lock_path, lock_info_json).unwrap();

        let result = FileLock::acquire(run_id, true, None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_lock_with_very_old_timestamp() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-very-old";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let old_lock_info = LockInfo {
            pid: 99999,
            created_at: 0,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&old_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), LockError::StaleLock { .. }));

        let lock = FileLock::acquire(run_id, true, None).unwrap();
        assert_eq!(lock.run_id(), run_id);
    }

    #[test]
    fn test_lock_with_future_timestamp() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-future";

        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let future_timestamp =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;

        let future_lock_info = LockInfo {
            pid: 99999,
            created_at: future_timestamp,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&future_lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        // saturating_sub keeps this from overflowing/panicking regardless of outcome.
        let result = FileLock::acquire(run_id, false, None);
        assert!(
            result.is_ok() || result.is_err(),
            "Should handle future timestamp without panic"
        );
    }

    #[test]
    fn test_lock_info_with_special_characters_in_run_id() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-with-special-@#$%";

        let result = FileLock::acquire(run_id, false, None);
        if let Ok(lock) = result {
            assert_eq!(lock.run_id(), run_id);
        }
    }

    #[test]
    fn test_get_lock_info_with_nonexistent_lock() {
        let _temp_dir = setup_test_env();

        let run_id = "nonexistent-lock-run";

        let result = FileLock::get_lock_info(run_id);
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_get_lock_info_with_corrupted_lock() {
        let _temp_dir = setup_test_env();

        let run_id = "corrupted-lock-info-run";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        fs::write(&lock_path, "not json at all").unwrap();

        let result = FileLock::get_lock_info(run_id);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            LockError::CorruptedLock { .. }
        ));
    }

    #[test]
    fn test_empty_lockfile_error_includes_run_id() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-empty-lockfile-msg";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        fs::write(&lock_path, "").unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());

        match result.unwrap_err() {
            LockError::CorruptedLock { reason } => {
                assert!(
                    reason.contains(run_id),
                    "Error message should contain run_id: {reason}"
                );
                assert!(
                    reason.contains("empty") || reason.contains("initializing"),
                    "Error message should mention empty/initializing: {reason}"
                );
            }
            other => panic!("Expected CorruptedLock error, got: {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_lock_error_includes_run_id() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-concurrent-msg";

        let _lock1 = FileLock::acquire(run_id, false, None).unwrap();

        let result = FileLock::acquire(run_id, false, None);
        assert!(result.is_err());

        match result.unwrap_err() {
            LockError::ConcurrentExecution { run_id: err_run, .. } => {
                assert_eq!(err_run, run_id);
            }
            other => panic!("Expected ConcurrentExecution error, got: {other:?}"),
        }
    }

    #[test]
    fn test_validate_existing_lock_handles_clock_skew() {
        let _temp_dir = setup_test_env();

        let run_id = "test-run-clock-skew-validation";
        let lock_path = FileLock::get_lock_path(run_id);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();

        let future_timestamp =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;

        let lock_info = LockInfo {
            pid: 99999,
            created_at: future_timestamp,
            run_id: run_id.to_string(),
            dcmrelay_version: "0.1.0".to_string(),
        };

        let lock_json = serde_json::to_string_pretty(&lock_info).unwrap();
        fs::write(&lock_path, lock_json).unwrap();

        let result = FileLock::acquire(run_id, true, None);
        assert!(result.is_ok(), "Should handle clock skew gracefully");
    }
}
