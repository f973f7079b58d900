//! Configuration file support for ocdflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (OCDFLASH_*, PLATFORMIO_CORE_DIR)
//! 3. Local config file (`ocdflash.toml` in the project directory)
//! 4. Global config file (~/.config/ocdflash/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local configuration file.
pub const LOCAL_CONFIG: &str = "ocdflash.toml";

/// Uploader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Package providing OpenOCD (default: tool-openocd).
    pub package: Option<String>,
    /// Use this OpenOCD installation instead of the PlatformIO package.
    pub package_dir: Option<PathBuf>,
    /// OpenOCD debug level (0-4).
    pub debug_level: Option<u8>,
}

/// Project defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDefaults {
    /// Environment to use when none is given.
    pub environment: Option<String>,
    /// PlatformIO core directory.
    pub core_dir: Option<PathBuf>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Uploader configuration.
    #[serde(default)]
    pub uploader: UploaderConfig,
    /// Project defaults.
    #[serde(default)]
    pub project: ProjectDefaults,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load(project_dir: &Path) -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        let local_path = project_dir.join(LOCAL_CONFIG);
        if let Some(local_config) = Self::load_from_file(&local_path) {
            debug!("Loaded local config from {}", local_path.display());
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Self>(&content) {
                Ok(mut config) => {
                    if let Some(base) = path.parent() {
                        config.resolve_paths(base);
                    }
                    Some(config)
                },
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Relative paths in a config file are relative to the file itself.
    fn resolve_paths(&mut self, base: &Path) {
        let paths = [&mut self.uploader.package_dir, &mut self.project.core_dir];
        for path in paths.into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ocdflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        // Uploader config
        if other.uploader.package.is_some() {
            self.uploader.package = other.uploader.package;
        }
        if other.uploader.package_dir.is_some() {
            self.uploader.package_dir = other.uploader.package_dir;
        }
        if other.uploader.debug_level.is_some() {
            self.uploader.debug_level = other.uploader.debug_level;
        }

        // Project defaults
        if other.project.environment.is_some() {
            self.project.environment = other.project.environment;
        }
        if other.project.core_dir.is_some() {
            self.project.core_dir = other.project.core_dir;
        }
    }
}
