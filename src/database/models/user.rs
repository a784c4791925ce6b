use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Model;

pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub family_id: Option<Uuid>,
}

impl Model for User {
    const TABLE: &'static str = "users";
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}
