use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::ticket::UserId;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub method: String,
    #[serde(default)]
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn new(user_id: UserId, method: impl Into<String>) -> Self {
        Self {
            user_id,
            method: method.into(),
            claims: HashMap::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(UserId::new("anonymous"), "none")
    }
}
