use axum::Json;
use serde::Serialize;

use crate::auth::Owner;

#[derive(Serialize)]
pub struct MeResponse {
    pub owner_key: String,
    pub guest: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: String,
    pub role: Option<String>,
}

/// Current caller: the verified token's identity, or the guest profile
pub async fn get_me(owner: Owner) -> Json<MeResponse> {
    Json(MeResponse {
        owner_key: owner.owner_key.clone(),
        guest: owner.is_guest(),
        user_id: owner.user_id.clone(),
        email: owner.email.clone(),
        name: owner.display_name().to_string(),
        role: owner.role.clone(),
    })
}
