use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::role::Role;

/// Row used during login; carries the stored hash and must never be serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserSummary {
    #[schema(example = 7)]
    pub id: i64,
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "employee")]
    pub role: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ChatUser {
    #[schema(example = 7)]
    pub id: i64,
    #[schema(example = "jdoe")]
    pub username: String,
}

/// A new credential record, already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}
