//! Byte-exact upstream responses.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::http::headers::HeaderList;

/// Status, headers and body of an upstream response, captured without
/// interpreting the status. The JSON form carries the body base64-encoded
/// under `data`; it is also the persisted form of server cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: HeaderList,
    #[serde(rename = "data", with = "base64_body")]
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: HeaderList::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The 4xx/5xx range is logged by the proxy.
    pub fn is_error(&self) -> bool {
        (400..600).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

mod base64_body {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_body_survives_json() {
        let mut response = RawResponse::new(200, vec![0u8, 159, 146, 150, 255]);
        response.headers.append("content-type", "image/png");

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"data\":\"AJ+Slv8=\""));

        let back: RawResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_status_ranges() {
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(304, "").is_error());
        assert!(RawResponse::new(404, "").is_error());
    }
}
