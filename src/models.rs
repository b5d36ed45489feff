use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single inventory row: an ordered map of field name to value.
///
/// Fields are whatever the imported spreadsheet contained; there is no
/// enforced schema and the field set may vary per record. serde_json is
/// built with `preserve_order`, so iteration order is insertion order.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Per-field allowed values, e.g. {"Building": ["A", "B"]}.
pub type LocationPermissions = BTreeMap<String, Vec<String>>;

/// A managed account stored in the `users` tree.
///
/// Passwords are stored and compared as plaintext, matching the demo-tool
/// behavior this replaces. Empty permission lists mean "unrestricted".
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub location_permissions: LocationPermissions,
    #[serde(default)]
    pub column_permissions: Vec<String>,
}

/// JWT payload carried in the session cookie.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionClaims {
    pub sub: String,
    pub role: Role,
    #[serde(default)]
    pub location_permissions: LocationPermissions,
    #[serde(default)]
    pub column_permissions: Vec<String>,
    pub exp: usize,
}

/// Generic JSON envelope for the mutation endpoints.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: None,
        }
    }

    pub fn ok_with_id(message: impl Into<String>, id: String) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: Some(id),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            id: None,
        }
    }
}

/// Response shape expected by the DataTables grid on the dashboards.
#[derive(Serialize, Deserialize, Debug)]
pub struct TableResponse {
    pub draw: u64,
    #[serde(rename = "recordsTotal")]
    pub records_total: u64,
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: u64,
    pub data: Vec<Record>,
}

impl TableResponse {
    pub fn empty(draw: u64) -> Self {
        Self {
            draw,
            records_total: 0,
            records_filtered: 0,
            data: vec![],
        }
    }
}
