//! Advisory checks on transfer recipients.
//!
//! Warnings are shown to the user next to the confirmation; they never block
//! the transfer.

use crate::config::{ExchangeConfig, TransferValidatorConfig};
use std::{collections::HashSet, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferWarning {
    /// Recipient is a known phishing account
    Phishing,
    /// Exchange does not accept deposits in this currency
    ExchangeDeposit(String),
    /// Exchange deposits need a memo to be credited
    ExchangeMemo,
}

impl fmt::Display for TransferWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferWarning::Phishing => {
                write!(f, "This account is known to be used for phishing")
            }
            TransferWarning::ExchangeDeposit(currency) => {
                write!(f, "This exchange does not accept {} deposits", currency)
            }
            TransferWarning::ExchangeMemo => {
                write!(f, "Exchange deposits without a memo may be lost")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferValidator {
    phishing: HashSet<String>,
    exchanges: Vec<ExchangeConfig>,
}

impl TransferValidator {
    pub fn new(config: &TransferValidatorConfig) -> Self {
        Self {
            phishing: config.phishing_accounts.iter().cloned().collect(),
            exchanges: config.exchanges.clone(),
        }
    }

    pub fn is_phishing(&self, account: &str) -> bool {
        self.phishing.contains(account)
    }

    /// Check a transfer of `currency` to `account`.
    pub fn validate(
        &self,
        account: &str,
        currency: &str,
        has_memo: bool,
    ) -> Option<TransferWarning> {
        if self.is_phishing(account) {
            return Some(TransferWarning::Phishing);
        }

        let exchange = self.exchanges.iter().find(|e| e.account == account)?;
        if !exchange.tokens.iter().any(|t| t == currency) {
            return Some(TransferWarning::ExchangeDeposit(currency.to_string()));
        }
        if !has_memo {
            return Some(TransferWarning::ExchangeMemo);
        }
        None
    }
}
