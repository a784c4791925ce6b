#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

pub use familysphere_api::testing::{event, TestFamily, TestWorld};

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }

    /// `data` from a success envelope
    pub fn data(&self) -> Value {
        self.json().get("data").cloned().unwrap_or(Value::Null)
    }
}

pub fn app(world: &TestWorld) -> Router {
    familysphere_api::app(world.state.clone())
}

/// Run one request through the router in-process
pub async fn send(
    world: &TestWorld,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> Result<TestResponse> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body))?,
        None => builder.body(Body::empty())?,
    };

    let response = app(world).oneshot(request).await.context("router failed")?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(TestResponse {
        status,
        headers,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

pub async fn get(world: &TestWorld, uri: &str, family: &TestFamily) -> Result<TestResponse> {
    let token = world.token(&family.user)?;
    send(world, Method::GET, uri, Some(&token), None).await
}

pub async fn post(world: &TestWorld, uri: &str, family: &TestFamily, body: Value) -> Result<TestResponse> {
    let token = world.token(&family.user)?;
    send(world, Method::POST, uri, Some(&token), Some(body.to_string())).await
}

pub async fn put(world: &TestWorld, uri: &str, family: &TestFamily, body: Value) -> Result<TestResponse> {
    let token = world.token(&family.user)?;
    send(world, Method::PUT, uri, Some(&token), Some(body.to_string())).await
}

pub async fn delete(world: &TestWorld, uri: &str, family: &TestFamily, body: Option<Value>) -> Result<TestResponse> {
    let token = world.token(&family.user)?;
    send(world, Method::DELETE, uri, Some(&token), body.map(|b| b.to_string())).await
}

pub fn day(s: &str) -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
}
