use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    /// Parses the role column; unknown values yield `None`.
    pub fn from_db(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}
