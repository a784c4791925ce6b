use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::connection_service::ConnectionService;
use crate::database::models::fields;
use crate::database::models::{ItemType, ShareRecord, SharedItem};
use crate::database::{RowStore, StoreError};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::CurrentUser;
use crate::sharing;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ShareForm {
    #[serde(default, deserialize_with = "fields::family_list")]
    pub family_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ShareOutcome {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub shared_with: Vec<Uuid>,
    /// Families added or removed by this call
    pub changed: Vec<Uuid>,
}

pub struct SharingService {
    store: Arc<dyn RowStore>,
    connections: ConnectionService,
}

impl SharingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            connections: ConnectionService::new(state),
        }
    }

    /// Load an item and check the caller's family owns it
    async fn owned_item(&self, user: &CurrentUser, item_type: ItemType, item_id: Uuid) -> Result<SharedItem, ApiError> {
        let table = item_type.table();
        let row = self
            .store
            .select(table, FilterData::where_(json!({ "id": item_id })).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(format!("{} not found", item_type)))?;

        let item: SharedItem = serde_json::from_value(row).map_err(|e| StoreError::MalformedRow {
            table: table.to_string(),
            reason: e.to_string(),
        })?;
        if item.family_id != user.family_id {
            return Err(ApiError::forbidden(format!("You can only share your own family's {}", item_type)));
        }
        Ok(item)
    }

    async fn write_allow_list(&self, item_type: ItemType, item_id: Uuid, shared_with: &[Uuid]) -> Result<(), ApiError> {
        let mut changes = Map::new();
        changes.insert("shared_with".into(), json!(shared_with));
        self.store
            .update(item_type.table(), FilterData::where_(json!({ "id": item_id })), changes)
            .await?;
        Ok(())
    }

    /// Grant connected families access to an item. Every target must be
    /// connected with the item's feature switched on.
    pub async fn share(
        &self,
        user: &CurrentUser,
        item_type: ItemType,
        item_id: Uuid,
        form: ShareForm,
    ) -> Result<ShareOutcome, ApiError> {
        let targets = sharing::without(&form.family_ids, &[user.family_id]);
        if targets.is_empty() {
            return Err(ApiError::field_required("family_ids"));
        }

        let item = self.owned_item(user, item_type, item_id).await?;
        let connections = self.connections.connections_of(user.family_id).await?;
        let feature = item_type.feature();
        if let Some(denied) = targets
            .iter()
            .find(|t| !sharing::feature_enabled(&connections, user.family_id, **t, feature))
        {
            return Err(ApiError::forbidden(format!(
                "Family {} is not connected with {} sharing enabled",
                denied, feature
            )));
        }

        let (shared_with, added) = sharing::merged(&item.shared_with, &targets);
        if !added.is_empty() {
            self.write_allow_list(item_type, item_id, &shared_with).await?;
            for family in &added {
                let record = ShareRecord {
                    id: Uuid::new_v4(),
                    item_id,
                    family_id: user.family_id,
                    shared_with: *family,
                    shared_at: Some(Utc::now()),
                };
                let Value::Object(row) = serde_json::to_value(&record).map_err(StoreError::from)? else {
                    continue;
                };
                self.store.insert(item_type.share_table(), row).await?;
            }
            tracing::info!("Shared {} {} with {} families", item_type, item_id, added.len());
        }

        Ok(ShareOutcome {
            item_type,
            item_id,
            shared_with,
            changed: added,
        })
    }

    pub async fn unshare(
        &self,
        user: &CurrentUser,
        item_type: ItemType,
        item_id: Uuid,
        form: ShareForm,
    ) -> Result<ShareOutcome, ApiError> {
        if form.family_ids.is_empty() {
            return Err(ApiError::field_required("family_ids"));
        }
        let item = self.owned_item(user, item_type, item_id).await?;

        let shared_with = sharing::without(&item.shared_with, &form.family_ids);
        let removed: Vec<Uuid> = item
            .shared_with
            .iter()
            .copied()
            .filter(|id| form.family_ids.contains(id))
            .collect();

        if !removed.is_empty() {
            self.write_allow_list(item_type, item_id, &shared_with).await?;
        }
        self.store
            .delete(
                item_type.share_table(),
                FilterData::where_(json!({ "item_id": item_id, "shared_with": { "$in": form.family_ids } })),
            )
            .await?;

        Ok(ShareOutcome {
            item_type,
            item_id,
            shared_with,
            changed: removed,
        })
    }

    /// Items of connected families (feature enabled) that list the caller
    pub async fn shared_with_me(&self, user: &CurrentUser, item_type: ItemType) -> Result<Vec<Value>, ApiError> {
        let feature = item_type.feature();
        let table = item_type.table();
        let connections = self.connections.connections_of(user.family_id).await?;
        let owners: Vec<Uuid> = connections
            .iter()
            .filter(|c| c.has_feature(feature))
            .filter_map(|c| c.other_family(user.family_id))
            .collect();
        if owners.is_empty() {
            return Ok(vec![]);
        }

        let rows = self
            .store
            .select(table, FilterData::where_(sharing::shared_with_filter(user.family_id, &owners)))
            .await?;

        let mut visible = Vec::with_capacity(rows.len());
        for row in rows {
            let item: SharedItem = serde_json::from_value(row.clone()).map_err(|e| StoreError::MalformedRow {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
            if item.family_id != user.family_id
                && sharing::is_visible_gated(item.family_id, &item.shared_with, user.family_id, &connections, feature)
            {
                visible.push(row);
            }
        }
        Ok(visible)
    }
}
