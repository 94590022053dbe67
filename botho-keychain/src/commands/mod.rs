//! CLI Commands

pub mod check_transfer;
pub mod endpoints;
pub mod init;
pub mod status;

use anyhow::Result;
use botho_keychain::{
    config::KeychainConfig,
    endpoint::{EndpointRegistry, FileStore},
};
use std::path::{Path, PathBuf};

/// Configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Persisted endpoint preferences inside the data directory
pub const STORAGE_FILE: &str = "storage.json";

/// Loaded data directory.
pub struct Home {
    pub dir: PathBuf,
    pub config: KeychainConfig,
}

impl Home {
    pub fn load(dir: &Path) -> Result<Self> {
        let config = KeychainConfig::load_or_default(&dir.join(CONFIG_FILE))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            config,
        })
    }

    pub fn registry(&self) -> EndpointRegistry<FileStore> {
        EndpointRegistry::new(
            FileStore::new(self.dir.join(STORAGE_FILE)),
            &self.config.endpoints,
        )
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}
