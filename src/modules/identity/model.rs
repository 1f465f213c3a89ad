use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rpc::contract::UserDetailResponse;

/// The caller behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<UserDetailResponse> for AuthPrincipal {
    fn from(user: UserDetailResponse) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}
