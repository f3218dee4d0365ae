//! Server configuration
//!
//! Defines the configurable parameters of the server: where it listens, how
//! clients authenticate, and which resource limits apply to spawned jobs.

use anyhow::{Context, Result, bail};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default CPU quota: 200ms every 1s, i.e. 20% of one CPU
const DEFAULT_CPU_MAX: &str = "200000 1000000";

/// Default memory limit: 10 MiB
const DEFAULT_MEMORY_MAX: u64 = 10 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (e.g., "0.0.0.0:8080")
    pub bind_addr: String,

    /// Bearer token required on API requests; `None` disables authentication
    pub token: Option<String>,

    /// PEM certificate chain served over TLS
    pub tls_cert: Option<PathBuf>,

    /// PEM private key matching `tls_cert`
    pub tls_key: Option<PathBuf>,

    /// Whether spawned processes are placed into a limiting cgroup
    pub limits: bool,

    /// Mount point of the cgroup v2 hierarchy
    pub cgroup_root: PathBuf,

    /// Name of the cgroup created below `cgroup_root`
    pub cgroup_name: String,

    /// Value written to `cpu.max`
    pub cpu_max: String,

    /// Value written to `memory.max`
    pub memory_max: String,

    /// Whether status snapshots report CPU and memory usage
    pub sample_usage: bool,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - REXEC_BIND_ADDR (default: 0.0.0.0:8080)
    /// - REXEC_TOKEN (default: none, authentication disabled)
    /// - REXEC_TLS_CERT, REXEC_TLS_KEY (default: none, plain HTTP)
    /// - REXEC_LIMITS (bool, default: false)
    /// - REXEC_CGROUP_ROOT (default: /sys/fs/cgroup)
    /// - REXEC_CGROUP_NAME (default: rexec)
    /// - REXEC_CPU_MAX (default: "200000 1000000")
    /// - REXEC_MEMORY_MAX (bytes or "max", default: 10485760)
    /// - REXEC_SAMPLE_USAGE (bool, default: true)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let bool_var = |key: &str, default: bool| -> Result<bool> {
            match lookup(key) {
                Some(value) => parse_bool(&value).with_context(|| format!("invalid {}", key)),
                None => Ok(default),
            }
        };

        Ok(Self {
            bind_addr: lookup("REXEC_BIND_ADDR").unwrap_or(defaults.bind_addr),
            token: lookup("REXEC_TOKEN").or(defaults.token),
            tls_cert: lookup("REXEC_TLS_CERT")
                .map(PathBuf::from)
                .or(defaults.tls_cert),
            tls_key: lookup("REXEC_TLS_KEY").map(PathBuf::from).or(defaults.tls_key),
            limits: bool_var("REXEC_LIMITS", defaults.limits)?,
            cgroup_root: lookup("REXEC_CGROUP_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.cgroup_root),
            cgroup_name: lookup("REXEC_CGROUP_NAME").unwrap_or(defaults.cgroup_name),
            cpu_max: lookup("REXEC_CPU_MAX").unwrap_or(defaults.cpu_max),
            memory_max: lookup("REXEC_MEMORY_MAX").unwrap_or(defaults.memory_max),
            sample_usage: bool_var("REXEC_SAMPLE_USAGE", defaults.sample_usage)?,
        })
    }

    /// Certificate and key paths when TLS is configured
    pub fn tls(&self) -> Option<(&Path, &Path)> {
        Some((self.tls_cert.as_deref()?, self.tls_key.as_deref()?))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("bind_addr '{}' is not a socket address", self.bind_addr))?;

        if self.token.as_deref().is_some_and(str::is_empty) {
            bail!("token cannot be empty");
        }

        // Authentication is only offered over TLS.
        let auth = [
            self.token.is_some(),
            self.tls_cert.is_some(),
            self.tls_key.is_some(),
        ];
        if auth.iter().any(|set| *set) && !auth.iter().all(|set| *set) {
            bail!("token, tls_cert and tls_key must be configured together");
        }

        if self.limits {
            if self.cgroup_name.trim().is_empty() {
                bail!("cgroup_name cannot be empty");
            }
            validate_cpu_max(&self.cpu_max)?;
            validate_memory_max(&self.memory_max)?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            token: None,
            tls_cert: None,
            tls_key: None,
            limits: false,
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            cgroup_name: "rexec".to_string(),
            cpu_max: DEFAULT_CPU_MAX.to_string(),
            memory_max: DEFAULT_MEMORY_MAX.to_string(),
            sample_usage: true,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("'{}' is not a boolean", other),
    }
}

/// `cpu.max` takes "$MAX $PERIOD" or just "$MAX", where $MAX may be "max"
fn validate_cpu_max(value: &str) -> Result<()> {
    let mut parts = value.split_whitespace();
    let quota = parts.next().context("cpu_max cannot be empty")?;
    if quota != "max" && quota.parse::<u64>().map_or(true, |q| q == 0) {
        bail!("cpu_max quota '{}' must be a positive number or 'max'", quota);
    }
    if let Some(period) = parts.next() {
        if period.parse::<u64>().map_or(true, |p| p == 0) {
            bail!("cpu_max period '{}' must be a positive number", period);
        }
    }
    if parts.next().is_some() {
        bail!("cpu_max '{}' has too many fields", value);
    }
    Ok(())
}

fn validate_memory_max(value: &str) -> Result<()> {
    let value = value.trim();
    if value != "max" && value.parse::<u64>().map_or(true, |m| m == 0) {
        bail!("memory_max '{}' must be a positive number of bytes or 'max'", value);
    }
    Ok(())
}
