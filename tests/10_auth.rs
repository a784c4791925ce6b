mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{send, TestWorld};
use familysphere_api::database::models::User;
use familysphere_api::database::RowStore;
use familysphere_api::filter::FilterData;
use serde_json::json;

#[tokio::test]
async fn health_reports_memory_store() -> Result<()> {
    let world = TestWorld::new();
    let res = send(&world, Method::GET, "/health", None, None).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["store"], "memory");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_bearer_token() -> Result<()> {
    let world = TestWorld::new();

    let res = send(&world, Method::GET, "/api/calendar/events", None, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["success"], false);

    let res = send(&world, Method::GET, "/api/calendar/events", Some("not.a.token"), None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_for_moved_user_is_forbidden() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;

    // Token minted while maria belonged to Garcia, then she moves to Lee
    let token = world.token(&garcia.user)?;
    world
        .store
        .update(
            "users",
            FilterData::where_(json!({ "id": garcia.user.id })),
            json!({ "family_id": lee.id() }).as_object().cloned().unwrap_or_default(),
        )
        .await?;

    let res = send(&world, Method::GET, "/api/calendar/events", Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn token_for_deleted_user_is_rejected() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let token = world.token(&garcia.user)?;
    world.state.repo::<User>().delete_id(garcia.user.id).await?;

    let res = send(&world, Method::GET, "/api/calendar/events", Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}
