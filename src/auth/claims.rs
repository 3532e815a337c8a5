use serde::{Deserialize, Serialize};

/// JWT claims structure for Supabase tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub aud: String,
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// User metadata from Supabase; carries `full_name` for email sign-ups.
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

impl Claims {
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .as_ref()?
            .get("full_name")?
            .as_str()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}
