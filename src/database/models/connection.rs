use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::fields;
use super::Model;

/// Data categories a connection can open up to the other family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedFeature {
    Calendar,
    Tasks,
    Photos,
    Shopping,
    Emergency,
    Documents,
}

impl SharedFeature {
    pub const ALL: [SharedFeature; 6] = [
        SharedFeature::Calendar,
        SharedFeature::Tasks,
        SharedFeature::Photos,
        SharedFeature::Shopping,
        SharedFeature::Emergency,
        SharedFeature::Documents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SharedFeature::Calendar => "calendar",
            SharedFeature::Tasks => "tasks",
            SharedFeature::Photos => "photos",
            SharedFeature::Shopping => "shopping",
            SharedFeature::Emergency => "emergency",
            SharedFeature::Documents => "documents",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for SharedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted link between two families. One row per pair, stored in the
/// direction of the original request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConnection {
    pub id: Uuid,
    pub family_id: Uuid,
    pub connected_family_id: Uuid,
    #[serde(default)]
    pub connected_date: Option<DateTime<Utc>>,
    /// Raw feature names; unknown names are kept but never grant access
    #[serde(default, deserialize_with = "fields::string_list")]
    pub shared_features: Vec<String>,
}

impl Model for FamilyConnection {
    const TABLE: &'static str = "family_connections";
}

impl FamilyConnection {
    pub fn links(&self, a: Uuid, b: Uuid) -> bool {
        (self.family_id == a && self.connected_family_id == b) || (self.family_id == b && self.connected_family_id == a)
    }

    /// The family on the far side from `me`, if `me` is part of this link
    pub fn other_family(&self, me: Uuid) -> Option<Uuid> {
        if self.family_id == me {
            Some(self.connected_family_id)
        } else if self.connected_family_id == me {
            Some(self.family_id)
        } else {
            None
        }
    }

    pub fn has_feature(&self, feature: SharedFeature) -> bool {
        self.shared_features.iter().any(|f| f == feature.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub id: Uuid,
    pub requesting_family_id: Uuid,
    pub requested_family_id: Uuid,
    pub status: RequestStatus,
    #[serde(default)]
    pub request_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_date: Option<DateTime<Utc>>,
}

impl Model for ConnectionRequest {
    const TABLE: &'static str = "family_connection_requests";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_is_symmetric() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let conn: FamilyConnection = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "family_id": a,
            "connected_family_id": b,
            "shared_features": "[\"calendar\",\"bogus\"]"
        }))
        .unwrap();

        assert!(conn.links(a, b) && conn.links(b, a));
        assert!(!conn.links(a, c));
        assert_eq!(conn.other_family(b), Some(a));
        assert_eq!(conn.other_family(c), None);
        assert!(conn.has_feature(SharedFeature::Calendar));
        assert!(!conn.has_feature(SharedFeature::Tasks));
    }
}
