//! Init command

use anyhow::Result;
use botho_keychain::config::KeychainConfig;
use std::path::Path;

use super::{print_error, print_success, CONFIG_FILE};

/// Run the init command
pub fn run(data_dir: &Path, force: bool) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    if path.exists() && !force {
        print_error(&format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        ));
        return Ok(());
    }

    KeychainConfig::default().save(&path)?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}
