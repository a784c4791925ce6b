use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{
    ConnectionRequest, Family, FamilyConnection, ItemType, RequestStatus, SharedFeature, SharedItem,
};
use crate::database::{Repository, RowStore, StoreError};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;
use crate::sharing;
use crate::state::AppState;

/// Connections where `family` sits on either side
pub fn involving(family: Uuid) -> Value {
    json!({ "$or": [
        { "family_id": family },
        { "connected_family_id": family }
    ]})
}

/// Connection rows linking `a` and `b`, in either direction
pub fn pair(a: Uuid, b: Uuid) -> Value {
    json!({ "$or": [
        { "family_id": a, "connected_family_id": b },
        { "family_id": b, "connected_family_id": a }
    ]})
}

fn pending_between(a: Uuid, b: Uuid) -> Value {
    json!({
        "status": RequestStatus::Pending.as_str(),
        "$or": [
            { "requesting_family_id": a, "requested_family_id": b },
            { "requesting_family_id": b, "requested_family_id": a }
        ]
    })
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequestForm {
    #[serde(default)]
    pub family_code: String,
}

/// Feature selection: a list of enabled names or a name → flag map
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeatureSelection {
    Enabled(Vec<String>),
    Flags(HashMap<String, bool>),
}

impl FeatureSelection {
    /// Known features that are switched on, in canonical order
    pub fn enabled(&self) -> Vec<SharedFeature> {
        SharedFeature::ALL
            .into_iter()
            .filter(|f| match self {
                FeatureSelection::Enabled(names) => names.iter().any(|n| n == f.as_str()),
                FeatureSelection::Flags(flags) => flags.get(f.as_str()).copied().unwrap_or(false),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub features: FeatureSelection,
}

#[derive(Debug, Serialize)]
pub struct ConnectedFamily {
    pub connection_id: Uuid,
    pub family_id: Uuid,
    pub family_name: String,
    pub connected_date: Option<DateTime<Utc>>,
    pub shared_features: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingRequest {
    pub request_id: Uuid,
    pub family_id: Uuid,
    pub family_name: String,
    pub request_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionOverview {
    pub connections: Vec<ConnectedFamily>,
    pub incoming: Vec<PendingRequest>,
    pub outgoing: Vec<PendingRequest>,
}

#[derive(Debug, Serialize)]
pub struct SharingSettings {
    pub family_id: Uuid,
    pub features: BTreeMap<&'static str, bool>,
}

#[derive(Debug, Default, Serialize)]
pub struct DisconnectSummary {
    pub connections_removed: usize,
    pub share_records_removed: usize,
    pub items_updated: usize,
}

/// Which side of a request the caller must be on for a transition
#[derive(Clone, Copy)]
enum Side {
    Recipient,
    Sender,
}

pub struct ConnectionService {
    store: Arc<dyn RowStore>,
    families: Repository<Family>,
    connections: Repository<FamilyConnection>,
    requests: Repository<ConnectionRequest>,
}

impl ConnectionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            families: state.repo(),
            connections: state.repo(),
            requests: state.repo(),
        }
    }

    pub async fn connections_of(&self, family: Uuid) -> Result<Vec<FamilyConnection>, ApiError> {
        Ok(self.connections.select_any(FilterData::where_(involving(family))).await?)
    }

    async fn family_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, ApiError> {
        Ok(self
            .families
            .select_ids(ids)
            .await?
            .into_iter()
            .map(|f| (f.id, f.name))
            .collect())
    }

    pub async fn overview(&self, user: &CurrentUser) -> Result<ConnectionOverview, ApiError> {
        let me = user.family_id;
        let connections = self.connections_of(me).await?;
        let requests = self
            .requests
            .select_any(
                FilterData::where_(json!({
                    "status": RequestStatus::Pending.as_str(),
                    "$or": [ { "requesting_family_id": me }, { "requested_family_id": me } ]
                }))
                .order_by("request_date desc"),
            )
            .await?;

        let mut ids: Vec<Uuid> = connections.iter().filter_map(|c| c.other_family(me)).collect();
        ids.extend(requests.iter().map(|r| {
            if r.requesting_family_id == me { r.requested_family_id } else { r.requesting_family_id }
        }));
        let names = self.family_names(&ids).await?;
        let name_of = |id: Uuid| names.get(&id).cloned().unwrap_or_else(|| "Unknown family".to_string());

        let connections = connections
            .into_iter()
            .filter_map(|c| {
                let other = c.other_family(me)?;
                Some(ConnectedFamily {
                    connection_id: c.id,
                    family_id: other,
                    family_name: name_of(other),
                    connected_date: c.connected_date,
                    shared_features: c.shared_features,
                })
            })
            .collect();

        let (incoming, outgoing): (Vec<_>, Vec<_>) = requests.into_iter().partition(|r| r.requested_family_id == me);
        let pending = |r: ConnectionRequest, other: Uuid| PendingRequest {
            request_id: r.id,
            family_id: other,
            family_name: name_of(other),
            request_date: r.request_date,
        };

        Ok(ConnectionOverview {
            connections,
            incoming: incoming.into_iter().map(|r| { let other = r.requesting_family_id; pending(r, other) }).collect(),
            outgoing: outgoing.into_iter().map(|r| { let other = r.requested_family_id; pending(r, other) }).collect(),
        })
    }

    /// Ask the family holding `family_code` to connect
    pub async fn request(&self, user: &CurrentUser, form: ConnectRequestForm) -> Result<ConnectionRequest, ApiError> {
        let code = form.family_code.trim();
        if code.is_empty() {
            return Err(ApiError::field_required("family_code"));
        }

        let target = self
            .families
            .select_one(FilterData::where_(json!({ "code": code })))
            .await?
            .ok_or_else(|| ApiError::not_found("No family found with that code"))?;
        let me = user.family_id;

        if target.id == me {
            return Err(ApiError::bad_request("You cannot connect with your own family"));
        }
        if self.connections.select_one(FilterData::where_(pair(me, target.id))).await?.is_some() {
            return Err(ApiError::conflict(format!("Already connected with {}", target.name)));
        }
        if self.requests.select_one(FilterData::where_(pending_between(me, target.id))).await?.is_some() {
            return Err(ApiError::conflict(format!("A connection request with {} is already pending", target.name)));
        }

        let request = self
            .requests
            .insert(&ConnectionRequest {
                id: Uuid::new_v4(),
                requesting_family_id: me,
                requested_family_id: target.id,
                status: RequestStatus::Pending,
                request_date: Some(Utc::now()),
                response_date: None,
            })
            .await?;
        tracing::info!("Family {} requested a connection with {}", me, target.id);
        Ok(request)
    }

    /// Re-read a request and check it is pending and on the caller's side
    async fn pending_request(&self, user: &CurrentUser, id: Uuid, side: Side) -> Result<ConnectionRequest, ApiError> {
        let request = self
            .requests
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Connection request not found"))?;

        let allowed = match side {
            Side::Recipient => request.requested_family_id == user.family_id,
            Side::Sender => request.requesting_family_id == user.family_id,
        };
        if !allowed {
            return Err(ApiError::forbidden("This connection request does not belong to your family"));
        }
        if request.status != RequestStatus::Pending {
            return Err(ApiError::conflict(format!("Connection request is already {}", request.status.as_str())));
        }
        Ok(request)
    }

    async fn close(&self, id: Uuid, status: RequestStatus) -> Result<(), ApiError> {
        let mut changes = Map::new();
        changes.insert("status".into(), json!(status.as_str()));
        changes.insert("response_date".into(), json!(Utc::now()));
        let updated = self
            .requests
            .update_where(
                FilterData::where_(json!({ "id": id, "status": RequestStatus::Pending.as_str() })),
                changes,
            )
            .await?;
        if updated.is_empty() {
            return Err(ApiError::conflict("Connection request is no longer pending"));
        }
        Ok(())
    }

    pub async fn accept(&self, user: &CurrentUser, id: Uuid) -> Result<FamilyConnection, ApiError> {
        let request = self.pending_request(user, id, Side::Recipient).await?;
        let (from, to) = (request.requesting_family_id, request.requested_family_id);

        if self.connections.select_one(FilterData::where_(pair(from, to))).await?.is_some() {
            return Err(ApiError::conflict("These families are already connected"));
        }

        // Only the caller that flips the request out of pending inserts the
        // connection; the pair index rejects anything that slips through
        self.close(id, RequestStatus::Accepted).await?;
        let connection = self
            .connections
            .insert(&FamilyConnection {
                id: Uuid::new_v4(),
                family_id: from,
                connected_family_id: to,
                connected_date: Some(Utc::now()),
                shared_features: vec![],
            })
            .await?;

        tracing::info!("Families {} and {} are now connected", from, to);
        Ok(connection)
    }

    pub async fn reject(&self, user: &CurrentUser, id: Uuid) -> Result<(), ApiError> {
        self.pending_request(user, id, Side::Recipient).await?;
        self.close(id, RequestStatus::Rejected).await
    }

    pub async fn cancel(&self, user: &CurrentUser, id: Uuid) -> Result<(), ApiError> {
        self.pending_request(user, id, Side::Sender).await?;
        self.close(id, RequestStatus::Cancelled).await
    }

    /// Remove the connection, every share record between the pair and each
    /// side from the other's item allow-lists
    pub async fn disconnect(&self, user: &CurrentUser, other: Uuid) -> Result<DisconnectSummary, ApiError> {
        let me = user.family_id;
        let removed = self.connections.delete_where(FilterData::where_(pair(me, other))).await?;
        if removed.is_empty() {
            return Err(ApiError::not_found("Not connected with that family"));
        }

        let mut summary = DisconnectSummary {
            connections_removed: removed.len(),
            ..Default::default()
        };
        for item_type in ItemType::ALL {
            let records = self
                .store
                .delete(
                    item_type.share_table(),
                    FilterData::where_(json!({ "$or": [
                        { "family_id": me, "shared_with": other },
                        { "family_id": other, "shared_with": me }
                    ]})),
                )
                .await?;
            summary.share_records_removed += records.len();

            for (owner, revoked) in [(me, other), (other, me)] {
                summary.items_updated += self.revoke(item_type, owner, revoked).await?;
            }
        }

        tracing::info!(
            "Family {} disconnected from {}: {} share records removed, {} items updated",
            me,
            other,
            summary.share_records_removed,
            summary.items_updated
        );
        Ok(summary)
    }

    /// Drop `revoked` from the allow-list of every `owner` item of one type
    async fn revoke(&self, item_type: ItemType, owner: Uuid, revoked: Uuid) -> Result<usize, ApiError> {
        let table = item_type.table();
        let rows = self
            .store
            .select(table, FilterData::where_(sharing::shared_with_filter(revoked, &[owner])))
            .await?;

        let mut updated = 0;
        for row in rows {
            let item: SharedItem = serde_json::from_value(row).map_err(|e| StoreError::MalformedRow {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
            let mut changes = Map::new();
            changes.insert("shared_with".into(), json!(sharing::without(&item.shared_with, &[revoked])));
            updated += self
                .store
                .update(table, FilterData::where_(json!({ "id": item.id })), changes)
                .await?
                .len();
        }
        Ok(updated)
    }

    async fn connection_with(&self, user: &CurrentUser, other: Uuid) -> Result<FamilyConnection, ApiError> {
        self.connections
            .select_one(FilterData::where_(pair(user.family_id, other)))
            .await?
            .ok_or_else(|| ApiError::not_found("Not connected with that family"))
    }

    fn settings(other: Uuid, connection: &FamilyConnection) -> SharingSettings {
        SharingSettings {
            family_id: other,
            features: SharedFeature::ALL
                .into_iter()
                .map(|f| (f.as_str(), connection.has_feature(f)))
                .collect(),
        }
    }

    pub async fn get_settings(&self, user: &CurrentUser, other: Uuid) -> Result<SharingSettings, ApiError> {
        let connection = self.connection_with(user, other).await?;
        Ok(Self::settings(other, &connection))
    }

    pub async fn set_settings(&self, user: &CurrentUser, other: Uuid, form: SettingsForm) -> Result<SharingSettings, ApiError> {
        self.connection_with(user, other).await?;

        let enabled: Vec<&str> = form.features.enabled().iter().map(|f| f.as_str()).collect();
        let mut changes = Map::new();
        changes.insert("shared_features".into(), json!(enabled));
        let updated = self
            .connections
            .update_where(FilterData::where_(pair(user.family_id, other)), changes)
            .await?;

        let connection = updated
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found("Not connected with that family"))?;
        tracing::info!("Family {} shares [{}] with {}", user.family_id, enabled.join(", "), other);
        Ok(Self::settings(other, &connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use async_trait::async_trait;

    /// Memory store that yields to the scheduler before every call, so two
    /// joined futures interleave between reads and writes
    struct YieldingStore(MemoryStore);

    #[async_trait]
    impl RowStore for YieldingStore {
        async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError> {
            tokio::task::yield_now().await;
            self.0.select(table, filter).await
        }

        async fn insert(&self, table: &str, row: Map<String, Value>) -> Result<Value, StoreError> {
            tokio::task::yield_now().await;
            self.0.insert(table, row).await
        }

        async fn update(&self, table: &str, filter: FilterData, changes: Map<String, Value>) -> Result<Vec<Value>, StoreError> {
            tokio::task::yield_now().await;
            self.0.update(table, filter, changes).await
        }

        async fn delete(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError> {
            tokio::task::yield_now().await;
            self.0.delete(table, filter).await
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "yielding"
        }
    }

    #[tokio::test]
    async fn test_concurrent_accepts_create_one_connection() {
        let state = AppState::new(Arc::new(YieldingStore(MemoryStore::new())), crate::testing::test_config());
        let families: Repository<Family> = state.repo();
        let garcia = families
            .insert(&Family { id: Uuid::new_v4(), name: "Garcia".into(), code: "GAR123".into() })
            .await
            .unwrap();
        let lee = families
            .insert(&Family { id: Uuid::new_v4(), name: "Lee".into(), code: "LEE001".into() })
            .await
            .unwrap();
        let request = state
            .repo::<ConnectionRequest>()
            .insert(&ConnectionRequest {
                id: Uuid::new_v4(),
                requesting_family_id: garcia.id,
                requested_family_id: lee.id,
                status: RequestStatus::Pending,
                request_date: Some(Utc::now()),
                response_date: None,
            })
            .await
            .unwrap();
        let jin = CurrentUser {
            id: Uuid::new_v4(),
            username: "jin".into(),
            email: None,
            role: Some("Admin".into()),
            family_id: lee.id,
        };

        let service = ConnectionService::new(&state);
        let (first, second) = tokio::join!(service.accept(&jin, request.id), service.accept(&jin, request.id));

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(first.err().or(second.err()), Some(ApiError::Conflict(_))));
        let connections = state.repo::<FamilyConnection>().select_any(FilterData::default()).await.unwrap();
        assert_eq!(connections.len(), 1);
    }

    #[test]
    fn test_feature_selection_keeps_known_features_only() {
        let list: FeatureSelection = serde_json::from_value(json!(["photos", "calendar", "bogus"])).unwrap();
        assert_eq!(list.enabled(), vec![SharedFeature::Calendar, SharedFeature::Photos]);

        let flags: FeatureSelection =
            serde_json::from_value(json!({ "tasks": true, "emergency": false, "bogus": true })).unwrap();
        assert_eq!(flags.enabled(), vec![SharedFeature::Tasks]);
    }
}
