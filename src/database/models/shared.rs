use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::connection::SharedFeature;
use super::fields;

/// Kinds of family data that can be shared across a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Event,
    Task,
    Photo,
    ShoppingList,
    EmergencyContact,
}

impl ItemType {
    pub const ALL: [ItemType; 5] = [
        ItemType::Event,
        ItemType::Task,
        ItemType::Photo,
        ItemType::ShoppingList,
        ItemType::EmergencyContact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Event => "event",
            ItemType::Task => "task",
            ItemType::Photo => "photo",
            ItemType::ShoppingList => "shopping_list",
            ItemType::EmergencyContact => "emergency_contact",
        }
    }

    /// Table holding the items themselves
    pub fn table(&self) -> &'static str {
        match self {
            ItemType::Event => "events",
            ItemType::Task => "tasks",
            ItemType::Photo => "photos",
            ItemType::ShoppingList => "shopping_lists",
            ItemType::EmergencyContact => "emergency_contacts",
        }
    }

    /// Table recording which family an item was shared with
    pub fn share_table(&self) -> &'static str {
        match self {
            ItemType::Event => "shared_events",
            ItemType::Task => "shared_tasks",
            ItemType::Photo => "shared_photos",
            ItemType::ShoppingList => "shared_shopping_lists",
            ItemType::EmergencyContact => "shared_emergency_contacts",
        }
    }

    /// Connection feature that must be enabled to share this kind of item
    pub fn feature(&self) -> SharedFeature {
        match self {
            ItemType::Event => SharedFeature::Calendar,
            ItemType::Task => SharedFeature::Tasks,
            ItemType::Photo => SharedFeature::Photos,
            ItemType::ShoppingList => SharedFeature::Shopping,
            ItemType::EmergencyContact => SharedFeature::Emergency,
        }
    }
}

impl FromStr for ItemType {
    type Err = String;

    /// Accepts the singular item name, the table name or the feature name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.table() == s || t.feature().as_str() == s)
            .ok_or_else(|| format!("Invalid item type '{}'", s))
    }
}

impl Serialize for ItemType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any shareable row. Only ownership and the allow-list are interpreted;
/// the remaining columns pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedItem {
    pub id: Uuid,
    pub family_id: Uuid,
    #[serde(default, deserialize_with = "fields::family_list")]
    pub shared_with: Vec<Uuid>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Per-family share record in one of the `shared_*` tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Owning family
    pub family_id: Uuid,
    /// Family granted access
    pub shared_with: Uuid,
    #[serde(default)]
    pub shared_at: Option<DateTime<Utc>>,
}
