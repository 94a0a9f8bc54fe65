//! Configuration – reads/writes `~/.engram/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engram_crypto::{ChamberKey, generate_key};
use engram_memory::ConsolidationPolicy;
use engram_storage::{BackendConfig, RouterConfig};
use serde::{Deserialize, Serialize};

/// Consolidation thresholds (`[policy]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_short_term_limit")]
    pub short_term_memory_limit: usize,
    #[serde(default = "default_consolidation_threshold")]
    pub consolidation_threshold: f64,
    #[serde(default = "default_access_threshold")]
    pub access_frequency_threshold: u64,
    #[serde(default = "default_age_threshold_days")]
    pub age_threshold_days: u32,
}

impl PolicyConfig {
    pub fn to_policy(&self) -> ConsolidationPolicy {
        ConsolidationPolicy {
            short_term_memory_limit: self.short_term_memory_limit,
            consolidation_threshold: self.consolidation_threshold,
            access_frequency_threshold: self.access_frequency_threshold,
            age_threshold: chrono::Duration::days(i64::from(self.age_threshold_days)),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            short_term_memory_limit: default_short_term_limit(),
            consolidation_threshold: default_consolidation_threshold(),
            access_frequency_threshold: default_access_threshold(),
            age_threshold_days: default_age_threshold_days(),
        }
    }
}

/// Redundancy router settings (`[router]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSettings {
    #[serde(default = "default_true")]
    pub mirror_writes: bool,
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,
    #[serde(default = "default_max_uploads")]
    pub max_concurrent_uploads: usize,
}

impl RouterSettings {
    pub fn to_router_config(&self) -> RouterConfig {
        RouterConfig {
            mirror_writes: self.mirror_writes,
            backend_timeout: Duration::from_secs(self.backend_timeout_secs),
            max_concurrent_uploads: self.max_concurrent_uploads,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            mirror_writes: default_true(),
            backend_timeout_secs: default_backend_timeout(),
            max_concurrent_uploads: default_max_uploads(),
        }
    }
}

/// Persisted configuration stored in `~/.engram/config.toml`.
///
/// Plain values come before tables so the file serialises as valid TOML.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding chambers, messages and the graph.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Seconds between background consolidation cycles.
    #[serde(default = "default_consolidation_interval")]
    pub consolidation_interval_secs: u64,

    /// Secret from which consolidated-record keys are derived. Generated on
    /// first run; losing it makes long-term copies unreadable.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub consolidation_secret: String,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub router: RouterSettings,

    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("consolidation_interval_secs", &self.consolidation_interval_secs)
            .field(
                "consolidation_secret",
                if self.consolidation_secret.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("policy", &self.policy)
            .field("router", &self.router)
            .field("backends", &self.backends)
            .finish()
    }
}

impl Config {
    pub fn consolidation_interval(&self) -> Duration {
        Duration::from_secs(self.consolidation_interval_secs.max(1))
    }

    /// Generate the consolidation secret if none is set. Returns `true` when
    /// the config changed and should be saved.
    pub fn ensure_secret(&mut self) -> bool {
        if self.consolidation_secret.is_empty() {
            self.consolidation_secret = generate_key().encoded();
            true
        } else {
            false
        }
    }

    /// The validated consolidation secret.
    ///
    /// A malformed secret is reported rather than replaced: replacing it would
    /// orphan every long-term copy written under the old one.
    pub fn secret_key(&self) -> Result<ChamberKey, String> {
        ChamberKey::parse(&self.consolidation_secret)
            .map_err(|e| format!("consolidation_secret is unusable: {e}"))
    }
}

fn engram_home() -> PathBuf {
    home_dir().join(".engram")
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

fn default_database_path() -> PathBuf {
    engram_home().join("engram.db")
}
fn default_consolidation_interval() -> u64 {
    engram_memory::scheduler::DEFAULT_INTERVAL.as_secs()
}
fn default_short_term_limit() -> usize {
    100
}
fn default_consolidation_threshold() -> f64 {
    0.7
}
fn default_access_threshold() -> u64 {
    3
}
fn default_age_threshold_days() -> u32 {
    7
}
fn default_true() -> bool {
    true
}
fn default_backend_timeout() -> u64 {
    30
}
fn default_max_uploads() -> usize {
    4
}
fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::Directory {
        name: "local".to_string(),
        priority: 0,
        path: engram_home().join("objects"),
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            consolidation_interval_secs: default_consolidation_interval(),
            consolidation_secret: String::new(),
            policy: PolicyConfig::default(),
            router: RouterSettings::default(),
            backends: default_backends(),
        }
    }
}

/// Path of the config file: `$ENGRAM_CONFIG` or `~/.engram/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("ENGRAM_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_path_for_home(&home_dir()),
    }
}

pub(crate) fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".engram").join("config.toml")
}

/// Load the config from a specific path. Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the config at [`config_path`], writing defaults on first run.
///
/// Returns the config and whether the file was created or updated.
pub fn load_or_create() -> Result<(Config, bool), String> {
    load_or_create_at(&config_path())
}

pub(crate) fn load_or_create_at(path: &Path) -> Result<(Config, bool), String> {
    let (mut cfg, mut dirty) = match load_from(path)? {
        Some(cfg) => (cfg, false),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            (cfg, true)
        }
    };
    dirty |= cfg.ensure_secret();
    if dirty {
        save_to(&cfg, path)?;
    }
    Ok((cfg, dirty))
}

/// Apply `ENGRAM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ENGRAM_DATABASE` | `database_path` |
/// | `ENGRAM_CONSOLIDATION_INTERVAL` | `consolidation_interval_secs` |
/// | `ENGRAM_BACKEND_TIMEOUT` | `router.backend_timeout_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ENGRAM_DATABASE")
        && !v.is_empty()
    {
        cfg.database_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("ENGRAM_CONSOLIDATION_INTERVAL")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.consolidation_interval_secs = secs;
    }
    if let Ok(v) = std::env::var("ENGRAM_BACKEND_TIMEOUT")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.router.backend_timeout_secs = secs;
    }
}

/// Save the config to a specific path with owner-only permissions.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
