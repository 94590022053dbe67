//! Typed keychain requests.
//!
//! Every request kind the page can issue is a variant of [`KeychainRequest`],
//! carrying exactly the fields that kind needs. The constructors validate
//! key roles and amount precision so the dispatcher itself can stay
//! shape-agnostic. On the wire a request is an internally tagged JSON object:
//!
//! ```text
//! { "request_id": 7, "type": "transfer", "username": "alice", "to": "bob", ... }
//! ```

use crate::error::{KeychainError, KeychainResult};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Correlation id linking a dispatched request to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key role a request is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    Owner,
    Active,
    Posting,
    Memo,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyRole::Owner => "Owner",
            KeyRole::Active => "Active",
            KeyRole::Posting => "Posting",
            KeyRole::Memo => "Memo",
        };
        f.write_str(name)
    }
}

/// Roles that may encode or decode a message, or authorize raw broadcasts.
const MESSAGE_ROLES: &[KeyRole] = &[KeyRole::Owner, KeyRole::Active, KeyRole::Memo];

/// Roles that may sign a buffer or a call.
const SIGNING_ROLES: &[KeyRole] = &[KeyRole::Posting, KeyRole::Active, KeyRole::Memo];

/// Roles that may be granted to another account.
const ACCOUNT_AUTHORITY_ROLES: &[KeyRole] = &[KeyRole::Posting, KeyRole::Active, KeyRole::Memo];

/// Roles that may be granted to a key.
const KEY_AUTHORITY_ROLES: &[KeyRole] = &[KeyRole::Owner, KeyRole::Active, KeyRole::Memo];

fn check_role(kind: &'static str, role: KeyRole, allowed: &[KeyRole]) -> KeychainResult<KeyRole> {
    if allowed.contains(&role) {
        Ok(role)
    } else {
        Err(KeychainError::InvalidRole {
            kind,
            role: role.to_string(),
        })
    }
}

/// Accepts `5000` as well as `"5000"`.
fn int_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("{} is not an integer", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("{:?} is not an integer", s))),
        other => Err(de::Error::custom(format!("expected an integer, got {}", other))),
    }
}

/// A decimal amount carried as a string with a fixed number of decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    /// Parse an amount that must have exactly `decimals` fractional digits.
    pub fn with_decimals(amount: &str, decimals: usize) -> KeychainResult<Self> {
        let invalid = |reason| KeychainError::InvalidAmount {
            amount: amount.to_string(),
            reason,
        };

        let (whole, fraction) = amount
            .split_once('.')
            .ok_or_else(|| invalid("missing decimal point"))?;

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("integer part must be digits"));
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("fraction must be digits"));
        }
        if fraction.len() != decimals {
            return Err(invalid("wrong number of decimals"));
        }

        Ok(Self(amount.to_string()))
    }

    /// Parse an amount with the 3 decimals used by liquid balances.
    pub fn liquid(amount: &str) -> KeychainResult<Self> {
        Self::with_decimals(amount, 3)
    }

    /// The amount as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit of a delegation amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DelegationUnit {
    Hp,
    Vests,
}

impl DelegationUnit {
    fn decimals(self) -> usize {
        match self {
            DelegationUnit::Hp => 3,
            DelegationUnit::Vests => 6,
        }
    }
}

/// Private keys handed to the keychain by `addAccount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl AccountKeys {
    fn is_empty(&self) -> bool {
        self.active.is_none() && self.posting.is_none() && self.memo.is_none()
    }
}

/// Vote weights are expressed in basis points of 100%.
const MAX_VOTE_WEIGHT: i64 = 10_000;

/// A typed request issued by a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KeychainRequest {
    /// Encrypt a message for `receiver`, proving authority over `username`.
    Encode {
        username: String,
        receiver: String,
        message: String,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    /// Decode a message with one of `username`'s keys.
    Decode {
        username: String,
        message: String,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    /// Sign an arbitrary message.
    SignBuffer {
        /// `None` lets the user pick the account
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        message: String,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    AddAccountAuthority {
        username: String,
        #[serde(rename = "authorizedUsername")]
        authorized_username: String,
        role: KeyRole,
        weight: u32,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    RemoveAccountAuthority {
        username: String,
        #[serde(rename = "authorizedUsername")]
        authorized_username: String,
        role: KeyRole,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    AddKeyAuthority {
        username: String,
        #[serde(rename = "authorizedKey")]
        authorized_key: String,
        role: KeyRole,
        weight: u32,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    RemoveKeyAuthority {
        username: String,
        #[serde(rename = "authorizedKey")]
        authorized_key: String,
        role: KeyRole,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    /// Broadcast arbitrary operations.
    Broadcast {
        username: String,
        operations: Value,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    /// Sign an unsigned transaction without broadcasting it.
    SignTx {
        username: String,
        tx: Value,
        method: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    SignedCall {
        username: String,
        /// Remote method being called
        method: String,
        params: Value,
        #[serde(rename = "typeWif")]
        type_wif: KeyRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    Vote {
        username: String,
        permlink: String,
        author: String,
        #[serde(deserialize_with = "int_or_numeric_string")]
        weight: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    Transfer {
        username: String,
        to: String,
        amount: Amount,
        memo: String,
        /// When set the user cannot switch the sending account
        enforce: bool,
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    SendToken {
        username: String,
        to: String,
        amount: Amount,
        memo: String,
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    Delegation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        delegatee: String,
        amount: Amount,
        unit: DelegationUnit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    WitnessVote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        witness: String,
        /// `false` removes the vote
        vote: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    Proxy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        /// Empty string removes the proxy
        proxy: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    PowerUp {
        username: String,
        recipient: String,
        ppy: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    PowerDown {
        username: String,
        gpos_power: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    CreateClaimedAccount {
        username: String,
        new_account: String,
        owner: Value,
        active: Value,
        posting: Value,
        /// Public memo key
        memo: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    CreateProposal {
        username: String,
        receiver: String,
        subject: String,
        permlink: String,
        start: String,
        end: String,
        daily_pay: String,
        /// Stringified array of extensions
        extensions: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    RemoveProposal {
        username: String,
        /// Stringified array of proposal ids
        proposal_ids: String,
        extensions: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    UpdateProposalVote {
        username: String,
        proposal_ids: String,
        approve: bool,
        extensions: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rpc: Option<String>,
    },

    /// Import an account's private keys into the keychain.
    AddAccount { username: String, keys: AccountKeys },
}

impl KeychainRequest {
    pub fn encode(
        username: impl Into<String>,
        receiver: impl Into<String>,
        message: impl Into<String>,
        key: KeyRole,
    ) -> KeychainResult<Self> {
        Ok(Self::Encode {
            username: username.into(),
            receiver: receiver.into(),
            message: message.into(),
            method: check_role("encode", key, MESSAGE_ROLES)?,
            rpc: None,
        })
    }

    pub fn decode(
        username: impl Into<String>,
        message: impl Into<String>,
        key: KeyRole,
    ) -> KeychainResult<Self> {
        Ok(Self::Decode {
            username: username.into(),
            message: message.into(),
            method: check_role("decode", key, MESSAGE_ROLES)?,
            rpc: None,
        })
    }

    pub fn sign_buffer(
        username: Option<String>,
        message: impl Into<String>,
        key: KeyRole,
        title: Option<String>,
    ) -> KeychainResult<Self> {
        Ok(Self::SignBuffer {
            username,
            message: message.into(),
            method: check_role("signBuffer", key, SIGNING_ROLES)?,
            rpc: None,
            title,
        })
    }

    pub fn add_account_authority(
        username: impl Into<String>,
        authorized_username: impl Into<String>,
        role: KeyRole,
        weight: u32,
    ) -> KeychainResult<Self> {
        Ok(Self::AddAccountAuthority {
            username: username.into(),
            authorized_username: authorized_username.into(),
            role: check_role("addAccountAuthority", role, ACCOUNT_AUTHORITY_ROLES)?,
            weight,
            method: KeyRole::Active,
            rpc: None,
        })
    }

    pub fn remove_account_authority(
        username: impl Into<String>,
        authorized_username: impl Into<String>,
        role: KeyRole,
    ) -> KeychainResult<Self> {
        Ok(Self::RemoveAccountAuthority {
            username: username.into(),
            authorized_username: authorized_username.into(),
            role: check_role("removeAccountAuthority", role, ACCOUNT_AUTHORITY_ROLES)?,
            method: KeyRole::Active,
            rpc: None,
        })
    }

    pub fn add_key_authority(
        username: impl Into<String>,
        authorized_key: impl Into<String>,
        role: KeyRole,
        weight: u32,
    ) -> KeychainResult<Self> {
        Ok(Self::AddKeyAuthority {
            username: username.into(),
            authorized_key: authorized_key.into(),
            role: check_role("addKeyAuthority", role, KEY_AUTHORITY_ROLES)?,
            weight,
            method: KeyRole::Active,
            rpc: None,
        })
    }

    pub fn remove_key_authority(
        username: impl Into<String>,
        authorized_key: impl Into<String>,
        role: KeyRole,
    ) -> KeychainResult<Self> {
        Ok(Self::RemoveKeyAuthority {
            username: username.into(),
            authorized_key: authorized_key.into(),
            role: check_role("removeKeyAuthority", role, KEY_AUTHORITY_ROLES)?,
            method: KeyRole::Active,
            rpc: None,
        })
    }

    pub fn broadcast(
        username: impl Into<String>,
        operations: Value,
        key: KeyRole,
    ) -> KeychainResult<Self> {
        if !operations.is_array() {
            return Err(KeychainError::MissingField("operations"));
        }
        Ok(Self::Broadcast {
            username: username.into(),
            operations,
            method: check_role("broadcast", key, MESSAGE_ROLES)?,
            rpc: None,
        })
    }

    pub fn sign_tx(username: impl Into<String>, tx: Value, key: KeyRole) -> KeychainResult<Self> {
        Ok(Self::SignTx {
            username: username.into(),
            tx,
            method: check_role("signTx", key, MESSAGE_ROLES)?,
            rpc: None,
        })
    }

    pub fn signed_call(
        username: impl Into<String>,
        method: impl Into<String>,
        params: Value,
        key: KeyRole,
    ) -> KeychainResult<Self> {
        Ok(Self::SignedCall {
            username: username.into(),
            method: method.into(),
            params,
            type_wif: check_role("signedCall", key, SIGNING_ROLES)?,
            rpc: None,
        })
    }

    pub fn vote(
        username: impl Into<String>,
        permlink: impl Into<String>,
        author: impl Into<String>,
        weight: i64,
    ) -> KeychainResult<Self> {
        if !(-MAX_VOTE_WEIGHT..=MAX_VOTE_WEIGHT).contains(&weight) {
            return Err(KeychainError::InvalidWeight(weight));
        }
        Ok(Self::Vote {
            username: username.into(),
            permlink: permlink.into(),
            author: author.into(),
            weight,
            rpc: None,
        })
    }

    pub fn transfer(
        username: impl Into<String>,
        to: impl Into<String>,
        amount: &str,
        memo: impl Into<String>,
        currency: impl Into<String>,
        enforce: bool,
    ) -> KeychainResult<Self> {
        Ok(Self::Transfer {
            username: username.into(),
            to: to.into(),
            amount: Amount::liquid(amount)?,
            memo: memo.into(),
            enforce,
            currency: currency.into(),
            rpc: None,
        })
    }

    pub fn send_token(
        username: impl Into<String>,
        to: impl Into<String>,
        amount: &str,
        memo: impl Into<String>,
        currency: impl Into<String>,
    ) -> KeychainResult<Self> {
        Ok(Self::SendToken {
            username: username.into(),
            to: to.into(),
            amount: Amount::liquid(amount)?,
            memo: memo.into(),
            currency: currency.into(),
            rpc: None,
        })
    }

    pub fn delegation(
        username: Option<String>,
        delegatee: impl Into<String>,
        amount: &str,
        unit: DelegationUnit,
    ) -> KeychainResult<Self> {
        Ok(Self::Delegation {
            username,
            delegatee: delegatee.into(),
            amount: Amount::with_decimals(amount, unit.decimals())?,
            unit,
            rpc: None,
        })
    }

    pub fn witness_vote(username: Option<String>, witness: impl Into<String>, vote: bool) -> Self {
        Self::WitnessVote {
            username,
            witness: witness.into(),
            vote,
            rpc: None,
        }
    }

    pub fn proxy(username: Option<String>, proxy: impl Into<String>) -> Self {
        Self::Proxy {
            username,
            proxy: proxy.into(),
            rpc: None,
        }
    }

    pub fn power_up(
        username: impl Into<String>,
        recipient: impl Into<String>,
        amount: &str,
    ) -> KeychainResult<Self> {
        Ok(Self::PowerUp {
            username: username.into(),
            recipient: recipient.into(),
            ppy: Amount::liquid(amount)?,
            rpc: None,
        })
    }

    pub fn power_down(username: impl Into<String>, amount: &str) -> KeychainResult<Self> {
        Ok(Self::PowerDown {
            username: username.into(),
            gpos_power: Amount::liquid(amount)?,
            rpc: None,
        })
    }

    pub fn create_claimed_account(
        username: impl Into<String>,
        new_account: impl Into<String>,
        owner: Value,
        active: Value,
        posting: Value,
        memo: impl Into<String>,
    ) -> Self {
        Self::CreateClaimedAccount {
            username: username.into(),
            new_account: new_account.into(),
            owner,
            active,
            posting,
            memo: memo.into(),
            rpc: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_proposal(
        username: impl Into<String>,
        receiver: impl Into<String>,
        subject: impl Into<String>,
        permlink: impl Into<String>,
        daily_pay: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        extensions: impl Into<String>,
    ) -> Self {
        Self::CreateProposal {
            username: username.into(),
            receiver: receiver.into(),
            subject: subject.into(),
            permlink: permlink.into(),
            start: start.into(),
            end: end.into(),
            daily_pay: daily_pay.into(),
            extensions: extensions.into(),
            rpc: None,
        }
    }

    pub fn remove_proposal(
        username: impl Into<String>,
        proposal_ids: impl Into<String>,
        extensions: impl Into<String>,
    ) -> Self {
        Self::RemoveProposal {
            username: username.into(),
            proposal_ids: proposal_ids.into(),
            extensions: extensions.into(),
            rpc: None,
        }
    }

    pub fn update_proposal_vote(
        username: impl Into<String>,
        proposal_ids: impl Into<String>,
        approve: bool,
        extensions: impl Into<String>,
    ) -> Self {
        Self::UpdateProposalVote {
            username: username.into(),
            proposal_ids: proposal_ids.into(),
            approve,
            extensions: extensions.into(),
            rpc: None,
        }
    }

    /// At least one key must be given.
    pub fn add_account(username: impl Into<String>, keys: AccountKeys) -> KeychainResult<Self> {
        if keys.is_empty() {
            return Err(KeychainError::MissingField("keys"));
        }
        Ok(Self::AddAccount {
            username: username.into(),
            keys,
        })
    }

    /// Override the user's endpoint for this request only. `addAccount`
    /// never talks to the network and ignores the override.
    pub fn with_rpc(mut self, endpoint: impl Into<String>) -> Self {
        if let Some(rpc) = self.rpc_slot() {
            *rpc = Some(endpoint.into());
        }
        self
    }

    /// Endpoint override carried by this request, if any.
    pub fn rpc(&self) -> Option<&str> {
        use KeychainRequest::*;
        match self {
            Encode { rpc, .. }
            | Decode { rpc, .. }
            | SignBuffer { rpc, .. }
            | AddAccountAuthority { rpc, .. }
            | RemoveAccountAuthority { rpc, .. }
            | AddKeyAuthority { rpc, .. }
            | RemoveKeyAuthority { rpc, .. }
            | Broadcast { rpc, .. }
            | SignTx { rpc, .. }
            | SignedCall { rpc, .. }
            | Vote { rpc, .. }
            | Transfer { rpc, .. }
            | SendToken { rpc, .. }
            | Delegation { rpc, .. }
            | WitnessVote { rpc, .. }
            | Proxy { rpc, .. }
            | PowerUp { rpc, .. }
            | PowerDown { rpc, .. }
            | CreateClaimedAccount { rpc, .. }
            | CreateProposal { rpc, .. }
            | RemoveProposal { rpc, .. }
            | UpdateProposalVote { rpc, .. } => rpc.as_deref(),
            AddAccount { .. } => None,
        }
    }

    fn rpc_slot(&mut self) -> Option<&mut Option<String>> {
        use KeychainRequest::*;
        match self {
            Encode { rpc, .. }
            | Decode { rpc, .. }
            | SignBuffer { rpc, .. }
            | AddAccountAuthority { rpc, .. }
            | RemoveAccountAuthority { rpc, .. }
            | AddKeyAuthority { rpc, .. }
            | RemoveKeyAuthority { rpc, .. }
            | Broadcast { rpc, .. }
            | SignTx { rpc, .. }
            | SignedCall { rpc, .. }
            | Vote { rpc, .. }
            | Transfer { rpc, .. }
            | SendToken { rpc, .. }
            | Delegation { rpc, .. }
            | WitnessVote { rpc, .. }
            | Proxy { rpc, .. }
            | PowerUp { rpc, .. }
            | PowerDown { rpc, .. }
            | CreateClaimedAccount { rpc, .. }
            | CreateProposal { rpc, .. }
            | RemoveProposal { rpc, .. }
            | UpdateProposalVote { rpc, .. } => Some(rpc),
            AddAccount { .. } => None,
        }
    }

    /// Wire name of the request kind.
    pub fn kind(&self) -> &'static str {
        use KeychainRequest::*;
        match self {
            Encode { .. } => "encode",
            Decode { .. } => "decode",
            SignBuffer { .. } => "signBuffer",
            AddAccountAuthority { .. } => "addAccountAuthority",
            RemoveAccountAuthority { .. } => "removeAccountAuthority",
            AddKeyAuthority { .. } => "addKeyAuthority",
            RemoveKeyAuthority { .. } => "removeKeyAuthority",
            Broadcast { .. } => "broadcast",
            SignTx { .. } => "signTx",
            SignedCall { .. } => "signedCall",
            Vote { .. } => "vote",
            Transfer { .. } => "transfer",
            SendToken { .. } => "sendToken",
            Delegation { .. } => "delegation",
            WitnessVote { .. } => "witnessVote",
            Proxy { .. } => "proxy",
            PowerUp { .. } => "powerUp",
            PowerDown { .. } => "powerDown",
            CreateClaimedAccount { .. } => "createClaimedAccount",
            CreateProposal { .. } => "createProposal",
            RemoveProposal { .. } => "removeProposal",
            UpdateProposalVote { .. } => "updateProposalVote",
            AddAccount { .. } => "addAccount",
        }
    }
}

/// A request as it crosses the page boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub request_id: CorrelationId,
    #[serde(flatten)]
    pub request: KeychainRequest,
}

impl RequestEnvelope {
    pub fn new(request_id: CorrelationId, request: KeychainRequest) -> Self {
        Self {
            request_id,
            request,
        }
    }
}
