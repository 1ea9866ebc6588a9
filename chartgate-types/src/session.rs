use chrono::{DateTime, Utc};

/// `(platform="vendor", userEmail, userPassword)` — the input to C1, and the
/// key the KV collaborator's `getLatestSessionForUser` is queried with.
///
/// Modeled as an immutable value struct passed by copy, never a mutable
/// reference, per §9's "Credential objects" design note.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub platform: String,
    pub user_email: String,
    pub user_password: String,
}

impl Credentials {
    pub fn vendor(user_email: impl Into<String>, user_password: impl Into<String>) -> Self {
        Self {
            platform: "vendor".to_string(),
            user_email: user_email.into(),
            user_password: user_password.into(),
        }
    }
}

/// The session record produced by C1 and consumed read-only by C7, mirroring
/// the shape the credential-capture collaborator writes into the KV store
/// (§6). `session_cookie_signature` may legitimately be absent; its absence
/// is a recoverable warning surfaced by the caller, not a hard failure.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    pub session_cookie: String,
    pub session_cookie_signature: Option<String>,
    pub user_numeric_id: Option<String>,
    pub user_email: String,
    pub captured_at: DateTime<Utc>,
}

/// An opaque access token plus its decoded expiration instant. Never
/// persisted; cached under the owning session's cookie by C2.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtRecord {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The identity token used to authenticate a loaned connection, narrowed to
/// what this vendor's `set_auth_token` method needs: a bearer JWT. Kept as an
/// enum rather than a bare `String` so a future identity mechanism has
/// somewhere to land without changing every call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityToken {
    Bearer(String),
}

impl IdentityToken {
    pub fn as_str(&self) -> &str {
        match self {
            IdentityToken::Bearer(s) => s,
        }
    }
}
