//! Transfer recipient check

use anyhow::Result;
use botho_keychain::transfer_validator::TransferValidator;

use super::{print_success, print_warning, Home};

/// Run the check-transfer command
pub fn run(home: &Home, account: &str, currency: &str, memo: bool) -> Result<()> {
    let validator = TransferValidator::new(&home.config.transfer);

    match validator.validate(account, currency, memo) {
        Some(warning) => print_warning(&warning.to_string()),
        None => print_success(&format!("No warnings for {} to {}", currency, account)),
    }
    Ok(())
}
