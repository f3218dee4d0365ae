//! Resource limit groups
//!
//! Jobs created by a registry can be placed into a shared group that caps the
//! CPU and memory of every process in it. The registry only knows the
//! [`ResourceLimitGroup`] trait; [`CgroupLimits`] implements it on top of the
//! cgroup v2 filesystem.

use anyhow::{Context, Result, bail};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts at removing the cgroup directory while killed processes drain
const REMOVE_ATTEMPTS: u32 = 20;

/// Pause between two removal attempts
const REMOVE_DELAY: Duration = Duration::from_millis(50);

/// Group of processes sharing CPU and memory limits
pub trait ResourceLimitGroup: Send + Sync {
    /// Moves the process with the given PID into the group
    ///
    /// # Arguments
    /// * `pid` - Operating system process id
    ///
    /// # Returns
    /// Ok once the process is subject to the group's limits
    fn attach(&self, pid: u32) -> Result<()>;

    /// Tears the group down, killing whatever is still inside
    ///
    /// May block until the killed processes have left the group.
    fn release(&self) -> Result<()>;
}

/// A cgroup v2 directory with `cpu.max` and `memory.max` applied
#[derive(Debug)]
pub struct CgroupLimits {
    path: PathBuf,
}

impl CgroupLimits {
    /// Creates (or reuses) the cgroup `name` below `root` and applies the limits
    ///
    /// # Arguments
    /// * `root` - Mount point of the cgroup v2 hierarchy, usually `/sys/fs/cgroup`
    /// * `name` - Name of the group directory
    /// * `cpu_max` - Value for `cpu.max`, e.g. `"200000 1000000"`
    /// * `memory_max` - Value for `memory.max`, in bytes or `"max"`
    pub fn create(root: &Path, name: &str, cpu_max: &str, memory_max: &str) -> Result<Self> {
        let name = name.trim().trim_start_matches('/');
        if name.is_empty() {
            bail!("cgroup name is empty");
        }
        if name.split('/').any(|segment| segment == "..") {
            bail!("cgroup name must not contain '..'");
        }

        // The controllers have to be delegated by the parent before the child
        // exposes their knobs. Usually already the case on systemd hosts.
        if let Err(e) = write_existing(&root.join("cgroup.subtree_control"), "+cpu +memory") {
            warn!("Could not enable cpu and memory controllers: {:#}", e);
        }

        let path = root.join(name);
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create cgroup {}", path.display()))?;

        fs::write(path.join("cpu.max"), cpu_max)
            .with_context(|| format!("failed to write cpu.max for {}", path.display()))?;
        fs::write(path.join("memory.max"), memory_max)
            .with_context(|| format!("failed to write memory.max for {}", path.display()))?;

        info!(
            "Using cgroup {} (cpu.max={}, memory.max={})",
            path.display(),
            cpu_max,
            memory_max
        );

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceLimitGroup for CgroupLimits {
    fn attach(&self, pid: u32) -> Result<()> {
        fs::write(self.path.join("cgroup.procs"), pid.to_string()).with_context(|| {
            format!("failed to move process {} into {}", pid, self.path.display())
        })
    }

    fn release(&self) -> Result<()> {
        // cgroup.kill only exists since Linux 5.14.
        if let Err(e) = write_existing(&self.path.join("cgroup.kill"), "1") {
            warn!("Could not kill cgroup {}: {:#}", self.path.display(), e);
        }

        // The directory stays busy until every killed process has exited.
        let mut attempt = 1;
        loop {
            match fs::remove_dir(&self.path) {
                Ok(()) => break,
                Err(e) if attempt < REMOVE_ATTEMPTS => {
                    debug!(
                        "Cgroup {} not removable yet ({}), retrying",
                        self.path.display(),
                        e
                    );
                    thread::sleep(REMOVE_DELAY);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("failed to remove cgroup {}", self.path.display())
                    });
                }
            }
        }

        info!("Removed cgroup {}", self.path.display());
        Ok(())
    }
}

/// Writes to a control file without creating it
fn write_existing(path: &Path, value: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(value.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_limits() {
        let root = TempDir::new().unwrap();
        let limits =
            CgroupLimits::create(root.path(), "rexec", "200000 1000000", "10485760").unwrap();

        assert_eq!(limits.path(), root.path().join("rexec"));
        assert_eq!(
            fs::read_to_string(limits.path().join("cpu.max")).unwrap(),
            "200000 1000000"
        );
        assert_eq!(
            fs::read_to_string(limits.path().join("memory.max")).unwrap(),
            "10485760"
        );
        // Not a cgroup mount, so the controller file must not be invented.
        assert!(!root.path().join("cgroup.subtree_control").exists());
    }

    #[test]
    fn test_create_rejects_bad_names() {
        let root = TempDir::new().unwrap();
        assert!(CgroupLimits::create(root.path(), "", "max", "max").is_err());
        assert!(CgroupLimits::create(root.path(), "  / ", "max", "max").is_err());
        assert!(CgroupLimits::create(root.path(), "../escape", "max", "max").is_err());
    }

    #[test]
    fn test_attach_writes_pid() {
        let root = TempDir::new().unwrap();
        let limits = CgroupLimits::create(root.path(), "/rexec", "max", "max").unwrap();

        limits.attach(4242).unwrap();
        assert_eq!(
            fs::read_to_string(limits.path().join("cgroup.procs")).unwrap(),
            "4242"
        );
    }

    #[test]
    fn test_attach_fails_when_group_is_gone() {
        let root = TempDir::new().unwrap();
        let limits = CgroupLimits::create(root.path(), "rexec", "max", "max").unwrap();
        fs::remove_dir_all(limits.path()).unwrap();

        assert!(limits.attach(1).is_err());
    }

    #[test]
    fn test_release_removes_empty_group() {
        let root = TempDir::new().unwrap();
        let limits = CgroupLimits::create(root.path(), "rexec", "max", "max").unwrap();
        // The kernel owns control files of a real cgroup; here they are plain
        // files that would keep the directory non-empty.
        fs::remove_file(limits.path().join("cpu.max")).unwrap();
        fs::remove_file(limits.path().join("memory.max")).unwrap();

        limits.release().unwrap();
        assert!(!limits.path().exists());
    }

    #[test]
    fn test_release_waits_for_group_to_drain() {
        let root = TempDir::new().unwrap();
        let limits = CgroupLimits::create(root.path(), "rexec", "max", "max").unwrap();
        let path = limits.path().to_path_buf();

        // Stands in for processes that leave the group shortly after the kill.
        let drain = thread::spawn(move || {
            thread::sleep(Duration::from_millis(120));
            fs::remove_file(path.join("cpu.max")).unwrap();
            fs::remove_file(path.join("memory.max")).unwrap();
        });

        limits.release().unwrap();
        drain.join().unwrap();
        assert!(!limits.path().exists());
    }

    #[test]
    fn test_release_gives_up_on_busy_group() {
        let root = TempDir::new().unwrap();
        let limits = CgroupLimits::create(root.path(), "rexec", "max", "max").unwrap();

        let err = limits.release().unwrap_err();
        assert!(format!("{:#}", err).contains("failed to remove cgroup"));
        assert!(limits.path().exists());
    }
}
