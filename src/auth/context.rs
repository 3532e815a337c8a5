use super::Claims;
use crate::domain::GUEST_OWNER;

/// Caller identity for one request.
///
/// Saved projects, saved chats and editing sessions are all partitioned by
/// `owner_key`: the lower-cased email of a verified token (the subject when
/// the token has no email), or `guest` when no token was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub owner_key: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl AuthContext {
    pub fn guest() -> Self {
        Self {
            owner_key: GUEST_OWNER.to_string(),
            user_id: None,
            email: None,
            name: None,
            role: None,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        let email = claims
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase);

        Self {
            owner_key: email.clone().unwrap_or_else(|| claims.sub.clone()),
            user_id: Some(claims.sub.clone()),
            email,
            name: claims.full_name(),
            role: claims.role.clone(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    /// Name recorded as the author of task updates.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Guest")
    }
}
