use serde::{Deserialize, Serialize};

/// A Chatvault user identity as returned by the remote service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    /// Display name, falling back to the phone number
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.phone)
    }
}
