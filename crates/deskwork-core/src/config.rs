use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".deskwork";

/// Name of the workspace config file inside [`STATE_DIR`].
pub const CONFIG_FILE: &str = "deskwork.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeskworkConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reject updates planned against a revision that is no longer current.
    #[serde(default)]
    pub reject_stale_writes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Log,
    Spool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_spool_path")]
    pub spool_path: PathBuf,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            transport: TransportKind::default(),
            spool_path: default_spool_path(),
        }
    }
}

/// Per-operator settings from `~/.config/deskwork/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Default acting user id when neither `--as` nor `DESKWORK_USER` is set.
    #[serde(default)]
    pub acting_user: Option<i64>,
}

impl DeskworkConfig {
    /// Resolve a path from the config against the state directory.
    #[must_use]
    pub fn resolve(state_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            state_dir.join(path)
        }
    }

    #[must_use]
    pub fn database_path(&self, state_dir: &Path) -> PathBuf {
        Self::resolve(state_dir, &self.database.path)
    }

    #[must_use]
    pub fn spool_path(&self, state_dir: &Path) -> PathBuf {
        Self::resolve(state_dir, &self.notifications.spool_path)
    }
}

/// Load `.deskwork/deskwork.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(state_dir: &Path) -> Result<DeskworkConfig> {
    let path = state_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(DeskworkConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<DeskworkConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the operator's user-level config, falling back to defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("deskwork/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Find the `.deskwork` directory by walking up from `start`.
#[must_use]
pub fn find_state_dir(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(STATE_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("deskwork.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_pool_size() -> usize {
    4
}

fn default_spool_path() -> PathBuf {
    PathBuf::from("outbox.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.database.path, PathBuf::from("deskwork.db"));
        assert_eq!(cfg.database.busy_timeout_ms, 5_000);
        assert_eq!(cfg.database.pool_size, 4);
        assert!(!cfg.engine.reject_stale_writes);
        assert!(cfg.notifications.enabled);
        assert_eq!(cfg.notifications.transport, TransportKind::Log);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[engine]
reject_stale_writes = true

[notifications]
transport = "spool"
spool_path = "/var/spool/deskwork.jsonl"
"#,
        )
        .expect("write config");

        let cfg = load_config(dir.path()).expect("load should succeed");
        assert!(cfg.engine.reject_stale_writes);
        assert_eq!(cfg.notifications.transport, TransportKind::Spool);
        assert!(cfg.notifications.enabled);
        assert_eq!(cfg.database.pool_size, 4);
        assert_eq!(
            cfg.spool_path(dir.path()),
            PathBuf::from("/var/spool/deskwork.jsonl")
        );
        assert_eq!(
            cfg.database_path(dir.path()),
            dir.path().join("deskwork.db")
        );
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "[database\npath = 1").expect("write");
        let err = load_config(dir.path()).expect_err("parse should fail");
        assert!(format!("{err:#}").contains(CONFIG_FILE));
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let parsed = toml::from_str::<DeskworkConfig>("[notifications]\ntransport = \"smtp\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn find_state_dir_walks_up() {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = dir.path().join(STATE_DIR);
        std::fs::create_dir_all(&state).expect("create state dir");
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).expect("create nested");

        assert_eq!(find_state_dir(&nested), Some(state));
    }

    #[test]
    fn user_config_parses_acting_user() {
        let cfg: UserConfig = toml::from_str("output = \"json\"\nacting_user = 3\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.acting_user, Some(3));
    }
}
