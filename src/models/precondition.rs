use serde::{Deserialize, Serialize};

use crate::services::preconditions::TokenKind;

/// Request for POST /api/preconditions/validate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTokenRequest {
    pub kind: TokenKind,
    pub token: String,
}
