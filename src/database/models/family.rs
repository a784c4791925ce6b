use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Model;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    /// Invitation code other families use to request a connection
    pub code: String,
}

impl Model for Family {
    const TABLE: &'static str = "families";
}
