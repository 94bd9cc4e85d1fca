//! Session data model and backend wire types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// User record as returned by the backend.
///
/// Never edited field-by-field on the client; a refresh replaces the whole value.
/// Timestamps are kept exactly as received so cached copies round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    #[serde(alias = "first_name")]
    pub first_name: String,
    #[serde(alias = "last_name")]
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Parsed `createdAt`, if present and well-formed.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    /// Parsed `updatedAt`, if present and well-formed.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parses a backend timestamp.
///
/// Accepts RFC 3339 and offset-less ISO-8601 date-times (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Persisted session: bearer token plus the last-seen user record.
///
/// A missing token means signed out, even if a stale user is still cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            token: Some(token.into()),
            user: Some(user),
        }
    }

    /// Returns the token if one is stored and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `{ message }` body returned by register and logout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Body returned by `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Body returned by `GET /auth/profile`: `{ user }`, or a bare user object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileResponse {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl From<ProfileResponse> for UserProfile {
    fn from(response: ProfileResponse) -> Self {
        match response {
            ProfileResponse::Wrapped { user } | ProfileResponse::Bare(user) => user,
        }
    }
}
