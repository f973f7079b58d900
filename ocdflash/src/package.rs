//! Uploader package resolution.
//!
//! PlatformIO installs tools as packages under `<core dir>/packages/<name>`.
//! The OpenOCD package (`tool-openocd`) provides both the executable
//! (`bin/openocd`) and the scripts the board's server arguments refer to
//! through the `$PACKAGE_DIR` placeholder.

use directories::BaseDirs;
use log::{debug, warn};
use std::env;
use std::path::{Path, PathBuf};

/// Package that provides OpenOCD.
pub const DEFAULT_PACKAGE: &str = "tool-openocd";

/// Environment variable PlatformIO uses to relocate its core directory.
pub const CORE_DIR_ENV: &str = "PLATFORMIO_CORE_DIR";

/// PlatformIO core directory: `$PLATFORMIO_CORE_DIR`, else `~/.platformio`.
pub fn default_core_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(CORE_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".platformio"))
}

/// Resolves the install directory of the uploader package.
#[derive(Debug, Clone)]
pub struct PackageLocator {
    core_dir: PathBuf,
    package: String,
    explicit_dir: Option<PathBuf>,
}

impl PackageLocator {
    /// Locator for [`DEFAULT_PACKAGE`] under `core_dir`.
    pub fn new(core_dir: impl Into<PathBuf>) -> Self {
        Self {
            core_dir: core_dir.into(),
            package: DEFAULT_PACKAGE.to_string(),
            explicit_dir: None,
        }
    }

    /// Use a different package name.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Use this directory instead of searching the core directory.
    #[must_use]
    pub fn with_explicit_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.explicit_dir = dir;
        self
    }

    /// Where the package is expected to live.
    pub fn expected_dir(&self) -> PathBuf {
        match &self.explicit_dir {
            Some(dir) => dir.clone(),
            None => self.core_dir.join("packages").join(&self.package),
        }
    }

    /// Installed package directory, or `None` if it is not installed.
    ///
    /// An explicit directory is trusted as-is.
    pub fn package_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.explicit_dir {
            debug!("Using package directory {}", dir.display());
            return Some(dir.clone());
        }
        let dir = self.expected_dir();
        if dir.is_dir() {
            debug!("Found package {} at {}", self.package, dir.display());
            Some(dir)
        } else {
            warn!("Package {} is not installed ({})", self.package, dir.display());
            None
        }
    }
}

/// Render a directory the way it is substituted into arguments.
pub fn dir_to_string(dir: Option<&Path>) -> String {
    dir.map(|d| d.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_expected_dir_under_core() {
        let locator = PackageLocator::new("/opt/pio");
        assert_eq!(
            locator.expected_dir(),
            PathBuf::from("/opt/pio/packages/tool-openocd")
        );
    }

    #[test]
    fn test_with_package() {
        let locator = PackageLocator::new("/opt/pio").with_package("tool-openocd-esp32");
        assert!(locator.expected_dir().ends_with("packages/tool-openocd-esp32"));
    }

    #[test]
    fn test_installed_package_found() {
        let core = tempfile::tempdir().unwrap();
        let pkg = core.path().join("packages").join(DEFAULT_PACKAGE);
        fs::create_dir_all(&pkg).unwrap();
        assert_eq!(PackageLocator::new(core.path()).package_dir(), Some(pkg));
    }

    #[test]
    fn test_missing_package_is_none() {
        let core = tempfile::tempdir().unwrap();
        assert_eq!(PackageLocator::new(core.path()).package_dir(), None);
    }

    #[test]
    fn test_explicit_dir_trusted() {
        let locator = PackageLocator::new("/nonexistent")
            .with_explicit_dir(Some(PathBuf::from("/opt/tools/openocd")));
        assert_eq!(
            locator.package_dir(),
            Some(PathBuf::from("/opt/tools/openocd"))
        );
    }

    #[test]
    fn test_dir_to_string() {
        assert_eq!(dir_to_string(Some(Path::new("/opt/tools/openocd"))), "/opt/tools/openocd");
        assert_eq!(dir_to_string(None), "");
    }
}
