mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{day, delete, event, get, post, put, TestWorld};
use familysphere_api::database::models::{Event, SharedFeature};
use serde_json::json;
use uuid::Uuid;

fn request_id(data: &serde_json::Value) -> String {
    data["id"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn request_rules() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    world.family("Lee", "LEE001", "jin").await?;

    let res = post(&world, "/api/connections/request", &garcia, json!({ "family_code": "" })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = post(&world, "/api/connections/request", &garcia, json!({ "family_code": "NOPE00" })).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = post(&world, "/api/connections/request", &garcia, json!({ "family_code": "GAR123" })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    assert_eq!(world.store.len("family_connection_requests").await, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_pending_request_conflicts_in_either_direction() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;

    let res = post(&world, "/api/connections/request", &garcia, json!({ "family_code": "LEE001" })).await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(res.data()["status"], "pending");

    let res = post(&world, "/api/connections/request", &garcia, json!({ "family_code": "LEE001" })).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = post(&world, "/api/connections/request", &lee, json!({ "family_code": "GAR123" })).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    assert_eq!(world.store.len("family_connection_requests").await, 1);

    let overview = get(&world, "/api/connections", &lee).await?.data();
    assert_eq!(overview["incoming"][0]["family_name"], "Garcia");
    assert_eq!(overview["outgoing"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn accept_creates_one_connection() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;

    let sent = post(&world, "/api/connections/request", &garcia, json!({ "family_code": "LEE001" })).await?;
    let id = request_id(&sent.data());
    let accept = format!("/api/connections/requests/{}/accept", id);

    // Only the recipient may accept
    let res = post(&world, &accept, &garcia, json!({})).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = post(&world, &accept, &lee, json!({})).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);

    let res = post(&world, &accept, &lee, json!({})).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(world.store.len("family_connections").await, 1);

    let res = post(&world, "/api/connections/request", &lee, json!({ "family_code": "GAR123" })).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let overview = get(&world, "/api/connections", &garcia).await?.data();
    assert_eq!(overview["connections"][0]["family_name"], "Lee");
    assert_eq!(overview["connections"][0]["family_id"], lee.id().to_string());
    Ok(())
}

#[tokio::test]
async fn reject_and_cancel_belong_to_opposite_sides() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;
    let okafor = world.family("Okafor", "OKA777", "ada").await?;

    let first = request_id(&post(&world, "/api/connections/request", &garcia, json!({ "family_code": "LEE001" })).await?.data());
    let res = post(&world, &format!("/api/connections/requests/{}/cancel", first), &lee, json!({})).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = post(&world, &format!("/api/connections/requests/{}/reject", first), &lee, json!({})).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "rejected");

    let second = request_id(&post(&world, "/api/connections/request", &garcia, json!({ "family_code": "OKA777" })).await?.data());
    let res = post(&world, &format!("/api/connections/requests/{}/reject", second), &garcia, json!({})).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = post(&world, &format!("/api/connections/requests/{}/cancel", second), &garcia, json!({})).await?;
    assert_eq!(res.status, StatusCode::OK);

    // A closed request cannot be accepted later
    let res = post(&world, &format!("/api/connections/requests/{}/accept", second), &okafor, json!({})).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(world.store.len("family_connections").await, 0);

    let res = post(&world, &format!("/api/connections/requests/{}/accept", Uuid::new_v4()), &okafor, json!({})).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn settings_keep_known_features_only() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;
    let okafor = world.family("Okafor", "OKA777", "ada").await?;
    world.connect(&garcia, &lee, &[]).await?;

    let uri = format!("/api/connections/families/{}/settings", lee.id());
    let settings = get(&world, &uri, &garcia).await?.data();
    assert_eq!(settings["features"]["calendar"], false);

    let res = put(&world, &uri, &garcia, json!({ "features": ["calendar", "tasks", "teleport"] })).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let data = res.data();
    let features = &data["features"];
    assert_eq!(features["calendar"], true);
    assert_eq!(features["tasks"], true);
    assert_eq!(features["photos"], false);
    assert!(features.get("teleport").is_none());

    // The connection is symmetric, so the other side sees the same flags
    let from_lee = get(&world, &format!("/api/connections/families/{}/settings", garcia.id()), &lee).await?.data();
    assert_eq!(from_lee["features"]["tasks"], true);

    let res = put(&world, &uri, &garcia, json!({ "features": { "calendar": false, "photos": true } })).await?;
    assert_eq!(res.data()["features"]["calendar"], false);
    assert_eq!(res.data()["features"]["photos"], true);

    let res = get(&world, &format!("/api/connections/families/{}/settings", okafor.id()), &garcia).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn sharing_requires_the_feature() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;
    let okafor = world.family("Okafor", "OKA777", "ada").await?;
    world.connect(&garcia, &lee, &[SharedFeature::Tasks]).await?;

    let picnic = world.event(event(&garcia, "Picnic", day("2025-06-01"))).await?;
    let uri = format!("/api/connections/share/event/{}", picnic.id);
    let body = json!({ "family_ids": [lee.id()] });

    let res = post(&world, &uri, &garcia, body.clone()).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = post(&world, &uri, &okafor, json!({ "family_ids": [garcia.id()] })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = post(&world, "/api/connections/share/spaceship/1", &garcia, body.clone()).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    world.connect(&garcia, &okafor, &[SharedFeature::Calendar]).await?;
    let res = post(&world, &uri, &garcia, json!({ "family_ids": [okafor.id()] })).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.data()["changed"], json!([okafor.id()]));

    // Sharing again is a no-op
    let res = post(&world, &uri, &garcia, json!({ "family_ids": [okafor.id()] })).await?;
    assert_eq!(res.data()["changed"], json!([]));
    assert_eq!(world.store.len("shared_events").await, 1);

    let stored = world.state.repo::<Event>().select_id(picnic.id).await?.expect("event");
    assert_eq!(stored.shared_with, vec![okafor.id()]);
    Ok(())
}

#[tokio::test]
async fn unshare_removes_access() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;
    world.connect(&garcia, &lee, &[SharedFeature::Calendar]).await?;

    let picnic = world.event(event(&garcia, "Picnic", day("2025-06-01"))).await?;
    let uri = format!("/api/connections/share/event/{}", picnic.id);
    post(&world, &uri, &garcia, json!({ "family_ids": [lee.id()] })).await?;

    let shared = get(&world, "/api/connections/shared/event", &lee).await?.data();
    assert_eq!(shared[0]["title"], "Picnic");

    let res = delete(&world, &uri, &garcia, Some(json!({ "family_ids": [lee.id()] }))).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.data()["changed"], json!([lee.id()]));
    assert_eq!(world.store.len("shared_events").await, 0);

    let shared = get(&world, "/api/connections/shared/event", &lee).await?.data();
    assert_eq!(shared.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn shared_items_follow_the_feature_toggle() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;
    world.connect(&garcia, &lee, &[SharedFeature::Calendar]).await?;

    let picnic = world.event(event(&garcia, "Picnic", day("2025-06-01"))).await?;
    post(&world, &format!("/api/connections/share/event/{}", picnic.id), &garcia, json!({ "family_ids": [lee.id()] })).await?;
    let settings = format!("/api/connections/families/{}/settings", lee.id());

    let res = put(&world, &settings, &garcia, json!({ "features": { "calendar": false } })).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let shared = get(&world, "/api/connections/shared/event", &lee).await?.data();
    assert_eq!(shared.as_array().map(Vec::len), Some(0));

    // The allow-list survives the toggle
    put(&world, &settings, &garcia, json!({ "features": ["calendar"] })).await?;
    let shared = get(&world, "/api/connections/shared/event", &lee).await?.data();
    assert_eq!(shared.as_array().map(Vec::len), Some(1));
    assert_eq!(shared[0]["title"], "Picnic");

    // Owners never see their own items in the shared list
    let own = get(&world, "/api/connections/shared/event", &garcia).await?.data();
    assert_eq!(own.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn disconnect_revokes_everything_between_the_pair() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;
    let okafor = world.family("Okafor", "OKA777", "ada").await?;
    world.connect(&garcia, &lee, &[SharedFeature::Calendar, SharedFeature::Tasks]).await?;
    world.connect(&garcia, &okafor, &[SharedFeature::Tasks]).await?;

    let picnic = world.event(event(&garcia, "Picnic", day("2025-06-01"))).await?;
    post(&world, &format!("/api/connections/share/event/{}", picnic.id), &garcia, json!({ "family_ids": [lee.id()] })).await?;

    let task_id = Uuid::new_v4();
    world
        .insert_row(
            "tasks",
            json!({ "id": task_id, "family_id": garcia.id(), "title": "Bring chairs", "shared_with": [] }),
        )
        .await?;
    let res = post(
        &world,
        &format!("/api/connections/share/task/{}", task_id),
        &garcia,
        json!({ "family_ids": [lee.id(), okafor.id()] }),
    )
    .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);

    let tasks = get(&world, "/api/connections/shared/tasks", &lee).await?.data();
    assert_eq!(tasks[0]["title"], "Bring chairs");

    let res = delete(&world, &format!("/api/connections/families/{}", garcia.id()), &lee, None).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    let summary = res.data();
    assert_eq!(summary["connections_removed"], 1);
    assert_eq!(summary["share_records_removed"], 2);
    assert_eq!(summary["items_updated"], 2);

    let seen = get(&world, "/api/calendar/events", &lee).await?.data();
    assert_eq!(seen.as_array().map(Vec::len), Some(0));
    let tasks = get(&world, "/api/connections/shared/tasks", &lee).await?.data();
    assert_eq!(tasks.as_array().map(Vec::len), Some(0));

    // Okafor keeps its access to the task
    let tasks = get(&world, "/api/connections/shared/tasks", &okafor).await?.data();
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));
    assert_eq!(world.store.len("shared_tasks").await, 1);

    let res = delete(&world, &format!("/api/connections/families/{}", lee.id()), &garcia, None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}
