use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Presence of this file marks the application as installed.
    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("versionup.toml")
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join("database").join("upgrade")
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.root.join("storage")
    }

    pub fn purchase_sentinel_path(&self) -> PathBuf {
        self.storage_dir().join("installed")
    }

    pub fn upgrade_lock_path(&self) -> PathBuf {
        self.storage_dir().join("upgrade.lock")
    }

    pub fn domain_mapping_marker(&self) -> PathBuf {
        self.storage_dir()
            .join("framework")
            .join("plugins")
            .join("domainmapping")
    }

    pub fn is_installed(&self) -> bool {
        self.env_file().is_file()
    }

    /// Joins `path` onto the root unless it is already absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
