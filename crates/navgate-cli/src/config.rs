//! Mission configuration – reads/writes `~/.navgate/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use navgate_runtime::NavigateConfig;

/// Persisted configuration stored in `~/.navgate/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frame every goal is expressed in.
    #[serde(default = "default_world_frame")]
    pub world_frame: String,

    /// Frame detections are reported in.
    #[serde(default = "default_robot_frame")]
    pub robot_frame: String,

    #[serde(default = "default_action_name")]
    pub action_name: String,

    /// Service that accepts the truncation distance.
    #[serde(default = "default_truncation_service")]
    pub truncation_service: String,

    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Period of the tree tick loop.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Give up after this many ticks.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Where truncated policies are written.  Empty means
    /// `~/.navgate/policies`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_dir: String,

    /// Write truncated policies to `policy_dir` before dispatch.
    #[serde(default = "default_materialize_policies")]
    pub materialize_policies: bool,
}

fn default_world_frame() -> String {
    "map".to_string()
}
fn default_robot_frame() -> String {
    "base_link".to_string()
}
fn default_action_name() -> String {
    "/navigate_to_pose".to_string()
}
fn default_truncation_service() -> String {
    "navigation_system_node/set_truncate_distance".to_string()
}
fn default_readiness_timeout_ms() -> u64 {
    1000
}
fn default_tick_period_ms() -> u64 {
    100
}
fn default_max_ticks() -> u64 {
    600
}
fn default_materialize_policies() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_frame: default_world_frame(),
            robot_frame: default_robot_frame(),
            action_name: default_action_name(),
            truncation_service: default_truncation_service(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            tick_period_ms: default_tick_period_ms(),
            max_ticks: default_max_ticks(),
            policy_dir: String::new(),
            materialize_policies: default_materialize_policies(),
        }
    }
}

impl Config {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Settings for the `NavigateTo` nodes built from this config.
    pub fn navigate_config(&self, home: &str) -> NavigateConfig {
        let policy_dir = if self.policy_dir.is_empty() {
            navgate_dir(home).join("policies")
        } else {
            PathBuf::from(&self.policy_dir)
        };
        NavigateConfig {
            world_frame: self.world_frame.clone(),
            readiness_timeout: Duration::from_millis(self.readiness_timeout_ms),
            policy_dir,
            materialize_policies: self.materialize_policies,
            ..NavigateConfig::default()
        }
    }
}

/// The user's home directory, or `.` when it cannot be determined.
pub fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn navgate_dir(home: &str) -> PathBuf {
    PathBuf::from(home).join(".navgate")
}

/// Return the path to `~/.navgate/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    navgate_dir(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `NAVGATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `NAVGATE_WORLD_FRAME` | `world_frame` |
/// | `NAVGATE_ROBOT_FRAME` | `robot_frame` |
/// | `NAVGATE_READINESS_TIMEOUT_MS` | `readiness_timeout_ms` |
/// | `NAVGATE_TICK_PERIOD_MS` | `tick_period_ms` |
/// | `NAVGATE_POLICY_DIR` | `policy_dir` |
///
/// Unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("NAVGATE_WORLD_FRAME") {
        cfg.world_frame = v;
    }
    if let Ok(v) = std::env::var("NAVGATE_ROBOT_FRAME") {
        cfg.robot_frame = v;
    }
    if let Ok(v) = std::env::var("NAVGATE_READINESS_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.readiness_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("NAVGATE_TICK_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.tick_period_ms = ms;
    }
    if let Ok(v) = std::env::var("NAVGATE_POLICY_DIR") {
        cfg.policy_dir = v;
    }
}

/// Save the config to disk, creating `~/.navgate/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.robot_frame, "base_link");
        assert_eq!(loaded.action_name, "/navigate_to_pose");
        assert_eq!(loaded.max_ticks, 600);
        assert!(loaded.materialize_policies);
    }

    #[test]
    fn partial_file_takes_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_ticks = 20\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.max_ticks, 20);
        assert!(loaded.materialize_policies);
        assert_eq!(loaded.action_name, "/navigate_to_pose");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_ticks = \"many\"").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_navgate_dir() {
        let p = config_path_for_home("/home/robot");
        assert_eq!(p, PathBuf::from("/home/robot/.navgate/config.toml"));
    }

    #[test]
    fn navigate_config_uses_home_policy_dir_by_default() {
        let nav = Config::default().navigate_config("/home/robot");
        assert_eq!(nav.policy_dir, PathBuf::from("/home/robot/.navgate/policies"));
        assert_eq!(nav.world_frame, "map");
        assert_eq!(nav.readiness_timeout, Duration::from_secs(1));
        assert!(nav.materialize_policies);
    }

    #[test]
    fn materialize_policies_can_be_disabled() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "materialize_policies = false\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert!(!loaded.navigate_config("/home/robot").materialize_policies);
    }

    // Env-var tests each use a variable no other test reads.

    #[test]
    fn apply_env_overrides_changes_world_frame() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("NAVGATE_WORLD_FRAME", "odom") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.world_frame, "odom");
        unsafe { std::env::remove_var("NAVGATE_WORLD_FRAME") };
    }

    #[test]
    fn apply_env_overrides_changes_tick_period() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("NAVGATE_TICK_PERIOD_MS", "25") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.tick_period(), Duration::from_millis(25));
        unsafe { std::env::remove_var("NAVGATE_TICK_PERIOD_MS") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_timeout() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("NAVGATE_READINESS_TIMEOUT_MS", "soon") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.readiness_timeout_ms, 1000);
        unsafe { std::env::remove_var("NAVGATE_READINESS_TIMEOUT_MS") };
    }
}
