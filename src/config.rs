use crate::error::Result;
use crate::spatial::DEFAULT_TOLERANCE;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "speakeasy")
}

/// `progress.db` under the platform state dir, or local data where there is no state dir
pub fn default_database_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .join("progress.db")
    })
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tap_tolerance: f64,
    /// Feed every scored attempt into the mastery tracker as a rating
    pub track_progress: bool,
    pub log_level: String,
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tap_tolerance: DEFAULT_TOLERANCE,
            track_progress: true,
            log_level: "info".to_string(),
            database_path: None,
        }
    }
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(default_database_path)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = default_config_path().unwrap_or_else(|| PathBuf::from("speakeasy_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like `load`, but surfaces read and parse failures
    pub fn try_load(&self) -> Result<Config> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice::<Config>(&bytes)?)
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if !self.path.exists() {
            return Config::default();
        }
        match self.try_load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn saved_file_is_readable_json() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        store.save(&Config::default()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["tap_tolerance"], DEFAULT_TOLERANCE);
        assert_eq!(raw["track_progress"], true);
        assert!(raw["database_path"].is_null());
        assert_eq!(store.try_load().unwrap(), Config::default());
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            tap_tolerance: 0.1,
            track_progress: false,
            log_level: "debug".into(),
            database_path: Some(dir.path().join("progress.db")),
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
        assert!(store.try_load().is_err());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
        assert!(matches!(store.try_load(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{ "tap_tolerance": 0.02 }"#).unwrap();
        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.tap_tolerance, 0.02);
        assert!(loaded.track_progress);
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn explicit_database_path_wins() {
        let cfg = Config {
            database_path: Some(PathBuf::from("/tmp/here.db")),
            ..Config::default()
        };
        assert_eq!(cfg.database_path(), Some(PathBuf::from("/tmp/here.db")));
    }

    #[test]
    fn default_paths_are_named_for_the_app() {
        if let Some(path) = default_database_path() {
            assert!(path.ends_with("progress.db"));
            assert!(path.to_string_lossy().contains("speakeasy"));
        }
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("config.json"));
        }
    }
}
