use serde::{Deserialize, Serialize};

use crate::utils::format_timestamp;

/// Account role as understood by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Wire value used in filters and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "Regular user",
            Role::Admin => "Administrator",
        }
    }

    /// Parse a role from user input (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_status() -> bool {
    true
}

/// A user account as returned by read paths.
///
/// There is deliberately no `password` field: the backend never returns it
/// and the console never re-displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "default_status")]
    pub status: bool,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
    #[serde(
        rename = "gmtCreate",
        alias = "createdAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,
    #[serde(
        rename = "gmtModified",
        alias = "modifiedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub modified_at: Option<String>,
}

impl User {
    /// Name to show in tables: nickname if set, otherwise username.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }

    pub fn status_display(&self) -> &'static str {
        if self.status {
            "Enabled"
        } else {
            "Disabled"
        }
    }

    pub fn last_login_display(&self) -> String {
        self.last_login_at
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_default()
    }

    /// Build the draft that `save` would send for editing this record.
    pub fn to_draft(&self) -> UserDraft {
        UserDraft {
            id: Some(self.id),
            username: self.username.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            status: self.status,
            role: self.role,
            password: None,
        }
    }

    /// Apply an accepted update on top of this record. Server-maintained
    /// timestamps are kept as displayed.
    pub fn apply_draft(&mut self, draft: &UserDraft) {
        self.username = draft.username.clone();
        self.email = draft.email.clone();
        self.phone = draft.phone.clone();
        self.nickname = draft.nickname.clone();
        self.avatar = draft.avatar.clone();
        self.status = draft.status;
        self.role = draft.role;
    }
}

/// Outgoing create/update payload.
///
/// `id == None` means create; `password` is only ever present on create.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub status: bool,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserDraft {
    pub fn is_create(&self) -> bool {
        self.id.is_none()
    }
}

/// Cached profile of the signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub nickname: String,
}

impl Profile {
    /// Build a profile, falling back to the username when no nickname is given.
    pub fn new(username: impl Into<String>, nickname: Option<String>) -> Self {
        let username = username.into();
        let nickname = nickname
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| username.clone());
        Self { username, nickname }
    }
}
