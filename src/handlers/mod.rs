//! HTTP handlers in two tiers: public (no token) and protected (bearer JWT
//! plus a verified family member).

pub mod protected;
pub mod public;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ApiError;

/// Decode a JSON request body; an empty body reads as `{}`
pub fn read_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(serde_json::json!({}))?);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Parse a uuid path segment
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {} '{}'", what, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Body {
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    fn test_read_json_treats_empty_body_as_object() {
        let body: Body = read_json(&Bytes::from_static(b"  ")).unwrap();
        assert!(body.name.is_none());

        let body: Body = read_json(&Bytes::from_static(br#"{"name":"x"}"#)).unwrap();
        assert_eq!(body.name.as_deref(), Some("x"));

        assert!(matches!(read_json::<Body>(&Bytes::from_static(b"{nope")), Err(ApiError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid", "event id").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "event id").unwrap(), id);
    }
}
