//! Seed helpers for tests: an in-memory store with families, users,
//! events and connections, plus bearer tokens for the seeded users.

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::config::AppConfig;
use crate::database::models::{Event, Family, FamilyConnection, Model, SharedFeature, User};
use crate::database::{MemoryStore, RowStore};
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub const TEST_JWT_SECRET: &str = "familysphere-test-secret";

/// Development config with a fixed secret and a stable timezone
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = TEST_JWT_SECRET.to_string();
    config.security.enable_cors = false;
    config.calendar.timezone = "America/New_York".to_string();
    config
}

/// A seeded family with one member
#[derive(Clone, Debug)]
pub struct TestFamily {
    pub family: Family,
    pub user: User,
}

impl TestFamily {
    pub fn id(&self) -> Uuid {
        self.family.id
    }

    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.user.id,
            username: self.user.username.clone(),
            email: self.user.email.clone(),
            role: self.user.role.clone(),
            family_id: self.family.id,
        }
    }
}

pub struct TestWorld {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), test_config());
        Self { store, state }
    }

    /// Insert a raw row into any table
    pub async fn insert_row(&self, table: &str, row: Value) -> anyhow::Result<Value> {
        let Value::Object(map) = row else {
            anyhow::bail!("row for {} must be an object", table);
        };
        Ok(self.store.insert(table, map).await?)
    }

    pub async fn insert<T: Model>(&self, record: &T) -> anyhow::Result<T> {
        Ok(self.state.repo::<T>().insert(record).await?)
    }

    pub async fn rows(&self, table: &str) -> anyhow::Result<Vec<Value>> {
        Ok(self.store.select(table, Default::default()).await?)
    }

    /// Family named `name` with code `code` and an Admin member `username`
    pub async fn family(&self, name: &str, code: &str, username: &str) -> anyhow::Result<TestFamily> {
        let family = self
            .insert(&Family {
                id: Uuid::new_v4(),
                name: name.to_string(),
                code: code.to_string(),
            })
            .await?;
        let user = self.member(&family, username, Some("Admin")).await?;
        Ok(TestFamily { family, user })
    }

    pub async fn member(&self, family: &Family, username: &str, role: Option<&str>) -> anyhow::Result<User> {
        self.insert(&User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: Some(format!("{}@example.com", username)),
            role: role.map(str::to_string),
            family_id: Some(family.id),
        })
        .await
    }

    pub fn token(&self, user: &User) -> anyhow::Result<String> {
        let claims = Claims::for_user(user, 1)?;
        Ok(generate_jwt(&claims, &self.state.config.security)?)
    }

    /// Connection between two families with the given features on
    pub async fn connect(&self, a: &TestFamily, b: &TestFamily, features: &[SharedFeature]) -> anyhow::Result<FamilyConnection> {
        self.insert(&FamilyConnection {
            id: Uuid::new_v4(),
            family_id: a.id(),
            connected_family_id: b.id(),
            connected_date: Some(Utc::now()),
            shared_features: features.iter().map(|f| f.as_str().to_string()).collect(),
        })
        .await
    }

    pub async fn event(&self, event: Event) -> anyhow::Result<Event> {
        self.insert(&event).await
    }
}

/// A plain single-day event owned by `owner`
pub fn event(owner: &TestFamily, title: &str, date: NaiveDate) -> Event {
    Event {
        id: Uuid::new_v4(),
        title: title.to_string(),
        date,
        time: None,
        end_time: None,
        end_date: None,
        all_day: false,
        category: None,
        location: None,
        description: None,
        family_id: owner.id(),
        created_by: owner.user.id,
        is_recurring: false,
        recurrence_pattern: None,
        recurrence_end_date: None,
        rsvp_enabled: false,
        rsvp_deadline: None,
        rsvp_notify: false,
        reminder_enabled: false,
        reminder_time: None,
        notification_method: None,
        shared_with: vec![],
        created_at: Some(Utc::now()),
    }
}
