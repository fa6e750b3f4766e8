use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use exped_types::{CaseId, TokenRow};

/// Why a token was turned away.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// No such token.
    Invalid,
    AlreadyUsed,
    Expired,
}

impl Denial {
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::Invalid => "Invalid token",
            Denial::AlreadyUsed => "Link already used",
            Denial::Expired => "Link expired",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenDecision {
    Allow(CaseId),
    Deny(Denial),
}

/// Admit a looked-up token row at `now`.
///
/// Checks run in a fixed order: existence, reuse, expiry. A token whose
/// `expires_at` equals `now` is still valid.
pub fn evaluate_token(row: Option<&TokenRow>, now: DateTime<Utc>) -> TokenDecision {
    let Some(row) = row else {
        return TokenDecision::Deny(Denial::Invalid);
    };
    if row.used_at.is_some() {
        return TokenDecision::Deny(Denial::AlreadyUsed);
    }
    if row.expires_at < now {
        return TokenDecision::Deny(Denial::Expired);
    }
    TokenDecision::Allow(row.expediente_id.clone())
}
