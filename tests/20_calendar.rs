mod common;

use anyhow::Result;
use axum::http::{header, Method, StatusCode};
use chrono::NaiveTime;
use common::{day, event, get, post, send, TestWorld};
use familysphere_api::database::models::{Event, RecurrencePattern};
use serde_json::{json, Value};

fn ids(feed: &Value) -> Vec<String> {
    feed.as_array()
        .map(|items| items.iter().filter_map(|e| e["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn timed_event_without_end_runs_to_end_of_day() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let mut dentist = event(&garcia, "Dentist", day("2025-03-10"));
    dentist.time = NaiveTime::from_hms_opt(9, 0, 0);
    dentist.category = Some("Health".into());
    let dentist = world.event(dentist).await?;

    let res = get(&world, "/api/calendar/events", &garcia).await?;
    assert_eq!(res.status, StatusCode::OK);

    let feed = res.data();
    let entry = &feed[0];
    assert_eq!(entry["id"], dentist.id.to_string());
    assert_eq!(entry["start"], "2025-03-10T09:00:00");
    assert_eq!(entry["end"], "2025-03-10T23:59:59");
    assert_eq!(entry["backgroundColor"], "#8E24AA");
    assert!(entry.get("borderColor").is_none());
    assert_eq!(entry["extendedProps"]["location"], "");
    Ok(())
}

#[tokio::test]
async fn shared_event_is_visible_only_to_listed_family() -> Result<()> {
    let world = TestWorld::new();
    let a = world.family("Garcia", "GAR123", "maria").await?;
    let b = world.family("Lee", "LEE001", "jin").await?;
    let c = world.family("Okafor", "OKA777", "ada").await?;

    let mut picnic = event(&a, "Picnic", day("2025-05-03"));
    picnic.shared_with = vec![b.id()];
    let picnic = world.event(picnic).await?;

    let seen_by_b = get(&world, "/api/calendar/events", &b).await?.data();
    assert_eq!(ids(&seen_by_b), vec![picnic.id.to_string()]);
    assert_eq!(seen_by_b[0]["borderColor"], "#FF5722");
    assert_eq!(seen_by_b[0]["textColor"], "#FFFFFF");

    let seen_by_c = get(&world, "/api/calendar/events", &c).await?.data();
    assert!(ids(&seen_by_c).is_empty());

    let own_only = get(&world, "/api/calendar/events?include_shared=false", &b).await?.data();
    assert!(ids(&own_only).is_empty());
    Ok(())
}

#[tokio::test]
async fn moved_instance_renders_at_new_date_under_same_id() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let mut practice = event(&garcia, "Soccer practice", day("2025-03-03"));
    practice.time = NaiveTime::from_hms_opt(17, 30, 0);
    practice.is_recurring = true;
    practice.recurrence_pattern = Some(RecurrencePattern::Weekly);
    practice.recurrence_end_date = Some(day("2025-03-31"));
    let practice = world.event(practice).await?;

    let instance = format!("{}_2025-03-10", practice.id);
    let res = post(
        &world,
        "/api/events/dates",
        &garcia,
        json!({ "event_id": instance, "start_date": "2025-03-12" }),
    )
    .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.text);

    let feed = get(
        &world,
        "/api/calendar/events?start_date=2025-03-01&end_date=2025-03-31",
        &garcia,
    )
    .await?
    .data();
    let entries = feed.as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 5);

    let moved = entries.iter().find(|e| e["id"] == instance.as_str()).expect("moved instance");
    assert_eq!(moved["start"], "2025-03-12T17:30:00");
    assert_eq!(moved["extendedProps"]["recurrence_pattern"], "weekly");

    // The base row is untouched
    let stored: Event = world.state.repo::<Event>().select_id(practice.id).await?.expect("event");
    assert_eq!(stored.date, day("2025-03-03"));
    Ok(())
}

#[tokio::test]
async fn export_all_day_event_and_import_it_back() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let lee = world.family("Lee", "LEE001", "jin").await?;

    let mut holiday = event(&garcia, "Independence Day", day("2025-07-04"));
    holiday.all_day = true;
    world.event(holiday).await?;

    let mut biweekly = event(&garcia, "Piano", day("2025-07-01"));
    biweekly.time = NaiveTime::from_hms_opt(16, 0, 0);
    biweekly.is_recurring = true;
    biweekly.recurrence_pattern = Some(RecurrencePattern::Biweekly);
    world.event(biweekly).await?;

    let res = get(&world, "/api/calendar/export", &garcia).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::CONTENT_TYPE], "text/calendar; charset=utf-8");
    let disposition = res.headers[header::CONTENT_DISPOSITION].to_str()?;
    assert!(disposition.starts_with("attachment; filename=familysphere_calendar_"));
    assert!(disposition.ends_with(".ics"));

    let ics = res.text;
    assert!(ics.contains("X-WR-CALNAME:FamilySphere - maria's Family Calendar"));
    assert!(ics.contains("DTSTART;VALUE=DATE:20250704"));
    assert!(ics.contains("DTEND;VALUE=DATE:20250705"));
    assert!(ics.contains("RRULE:FREQ=WEEKLY;INTERVAL=2"));

    let token = world.token(&lee.user)?;
    let res = send(&world, Method::POST, "/api/calendar/import", Some(&token), Some(ics)).await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(res.data()["imported"], 2);

    let feed = get(&world, "/api/calendar/events?start_date=2025-07-01&end_date=2025-07-31", &lee)
        .await?
        .data();
    let holiday = feed
        .as_array()
        .and_then(|items| items.iter().find(|e| e["title"] == "Independence Day").cloned())
        .expect("imported holiday");
    assert_eq!(holiday["allDay"], true);
    assert_eq!(holiday["start"], "2025-07-04");
    assert_eq!(holiday["end"], "2025-07-04T23:59:59");
    assert_eq!(holiday["extendedProps"]["family_id"], lee.id().to_string());
    Ok(())
}

#[tokio::test]
async fn import_without_events_is_a_validation_error() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;
    let token = world.token(&garcia.user)?;

    let body = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n".to_string();
    let res = send(&world, Method::POST, "/api/calendar/import", Some(&token), Some(body)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["success"], false);
    assert_eq!(world.store.len("events").await, 0);
    Ok(())
}

#[tokio::test]
async fn agenda_groups_by_day_with_filter_title() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;

    let mut standup = event(&garcia, "Standup", day("2025-04-02"));
    standup.category = Some("Work".into());
    standup.time = NaiveTime::from_hms_opt(9, 0, 0);
    world.event(standup).await?;
    let mut review = event(&garcia, "Review", day("2025-04-02"));
    review.category = Some("Work".into());
    review.time = NaiveTime::from_hms_opt(8, 0, 0);
    world.event(review).await?;
    let mut recital = event(&garcia, "Recital", day("2025-04-03"));
    recital.category = Some("School".into());
    world.event(recital).await?;

    let uri = format!(
        "/api/calendar/agenda?start_date=2025-04-01&end_date=2025-04-30&category=Work&member_id={}",
        garcia.user.id
    );
    let agenda = get(&world, &uri, &garcia).await?.data();

    assert_eq!(agenda["title"], "Calendar: 2025-04-01 to 2025-04-30 - Work Events - maria's Events");
    let days = agenda["days"].as_array().cloned().unwrap_or_default();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], "2025-04-02");
    assert_eq!(days[0]["events"][0]["title"], "Review");
    assert_eq!(days[0]["events"][1]["title"], "Standup");
    Ok(())
}

#[tokio::test]
async fn bad_filter_date_is_rejected() -> Result<()> {
    let world = TestWorld::new();
    let garcia = world.family("Garcia", "GAR123", "maria").await?;

    let res = get(&world, "/api/calendar/events?start_date=03/01/2025", &garcia).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}
