//! Precondition token validation
//!
//! Location, inventory-reservation and payment steps each hand the customer a
//! token shaped `PREFIX_YYYYMMDD_HHMMSS_HASH8`. Order creation only checks the
//! shape and the age of a token; the issuing step owns the underlying state.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Tokens stamped further than this into the future are rejected
const MAX_CLOCK_SKEW_SECS: i64 = 300;

lazy_static! {
    static ref TOKEN_REGEX: Regex =
        Regex::new(r"^([A-Z]{3})_(\d{8})_(\d{6})_([A-F0-9]{8})$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Location,
    Inventory,
    Payment,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [TokenKind::Location, TokenKind::Inventory, TokenKind::Payment];

    pub fn prefix(self) -> &'static str {
        match self {
            TokenKind::Location => "LOC",
            TokenKind::Inventory => "INV",
            TokenKind::Payment => "TXN",
        }
    }

    pub fn max_age(self) -> Duration {
        match self {
            TokenKind::Location => Duration::hours(24),
            TokenKind::Inventory => Duration::minutes(60),
            TokenKind::Payment => Duration::minutes(120),
        }
    }

    /// Upstream step that issues this kind of token
    pub fn step(self) -> &'static str {
        match self {
            TokenKind::Location => "location verification",
            TokenKind::Inventory => "inventory reservation",
            TokenKind::Payment => "payment verification",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Location => "location",
            TokenKind::Inventory => "inventory",
            TokenKind::Payment => "payment",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a present token was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("Invalid {kind} token format: {reason}")]
    Malformed { kind: TokenKind, reason: String },
    #[error(
        "The {kind} token has expired: issued {age_minutes} minutes ago, maximum age is {max_minutes} minutes. Repeat the {} step",
        .kind.step()
    )]
    Expired {
        kind: TokenKind,
        age_minutes: i64,
        max_minutes: i64,
    },
}

impl TokenRejection {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenRejection::Malformed { kind, .. } | TokenRejection::Expired { kind, .. } => *kind,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TokenRejection::Malformed { .. } => "TOKEN_MALFORMED",
            TokenRejection::Expired { .. } => "TOKEN_EXPIRED",
        }
    }
}

/// Outcome in the `{valid, reason}` shape handed to external callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

/// Validate a token of the given kind against `now`.
///
/// Returns the embedded issuance time on success.
pub fn validate(kind: TokenKind, token: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TokenRejection> {
    let malformed = |reason: String| TokenRejection::Malformed { kind, reason };

    let caps = TOKEN_REGEX.captures(token.trim()).ok_or_else(|| {
        malformed(format!(
            "expected {}_YYYYMMDD_HHMMSS_XXXXXXXX with an uppercase hex suffix",
            kind.prefix()
        ))
    })?;

    let prefix = &caps[1];
    if prefix != kind.prefix() {
        return Err(malformed(format!(
            "expected prefix {}, got {}",
            kind.prefix(),
            prefix
        )));
    }

    let stamp = format!("{}{}", &caps[2], &caps[3]);
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S")
        .map_err(|_| malformed(format!("embedded timestamp {} is not a valid date/time", stamp)))?;
    let issued_at = Utc.from_utc_datetime(&naive);

    let age = now.signed_duration_since(issued_at);
    if age < -Duration::seconds(MAX_CLOCK_SKEW_SECS) {
        return Err(malformed(format!("embedded timestamp {} is in the future", issued_at)));
    }

    if age > kind.max_age() {
        return Err(TokenRejection::Expired {
            kind,
            age_minutes: age.num_minutes(),
            max_minutes: kind.max_age().num_minutes(),
        });
    }

    Ok(issued_at)
}

/// Validate and flatten the result into a [`TokenCheck`]
pub fn check(kind: TokenKind, token: &str, now: DateTime<Utc>) -> TokenCheck {
    match validate(kind, token, now) {
        Ok(issued_at) => TokenCheck {
            valid: true,
            reason: None,
            code: None,
            issued_at: Some(issued_at),
        },
        Err(rejection) => TokenCheck {
            valid: false,
            reason: Some(rejection.to_string()),
            code: Some(rejection.code().to_string()),
            issued_at: None,
        },
    }
}

/// Issue a token of the given kind stamped at `issued_at`.
///
/// The suffix is the first four bytes of SHA-256 over kind, timestamp and the
/// caller-provided material, hex encoded in uppercase.
pub fn issue(kind: TokenKind, issued_at: DateTime<Utc>, material: &str) -> String {
    let stamp = issued_at.format("%Y%m%d_%H%M%S").to_string();

    let mut hasher = Sha256::new();
    hasher.update(kind.prefix().as_bytes());
    hasher.update(b"|");
    hasher.update(stamp.as_bytes());
    hasher.update(b"|");
    hasher.update(material.as_bytes());
    let digest = hasher.finalize();

    format!("{}_{}_{}", kind.prefix(), stamp, hex::encode_upper(&digest[..4]))
}
