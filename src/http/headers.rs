//! Canonical header representation.
//!
//! # Responsibilities
//! - Normalize caller headers given as maps or pair lists into one ordered list
//! - Merge header blocks with last-writer-wins per name
//! - Keep repeated response headers (`set-cookie`) intact
//!
//! # Design Decisions
//! - Names are stored lowercase; lookups are case-insensitive as a result
//! - Wire form is a list of `[name, value]` pairs; a JSON object is accepted too

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered list of `(name, value)` pairs with lowercase names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Normalize any pair source. A repeated name replaces the earlier value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut list = Self::new();
        for (name, value) in pairs {
            list.insert(name.as_ref(), value);
        }
        list
    }

    /// Copy a response header map, keeping every repeated value.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut list = Self::new();
        for (name, value) in map {
            match value.to_str() {
                Ok(value) => list.append(name.as_str(), value),
                Err(_) => tracing::debug!(header = %name, "Dropping non-ASCII header value"),
            }
        }
        list
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set `name`, replacing every existing value in place of the first one.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.trim().to_ascii_lowercase();
        let value = value.into();
        match self.0.iter().position(|(k, _)| *k == name) {
            Some(idx) => {
                self.0[idx].1 = value;
                let mut seen = false;
                self.0.retain(|(k, _)| {
                    if *k != name {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.0.push((name, value)),
        }
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0.push((name.trim().to_ascii_lowercase(), value.into()));
    }

    /// Merge `other` over `self`; `other` wins on conflicting names.
    pub fn merge(&mut self, other: &HeaderList) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Convert for an outbound request. Invalid names or values are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid header"),
            }
        }
        map
    }
}

impl<'de> Deserialize<'de> for HeaderList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pairs(Vec<(String, String)>),
            Map(BTreeMap<String, String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Pairs(pairs) => {
                let mut list = HeaderList::new();
                for (name, value) in pairs {
                    list.append(&name, value);
                }
                list
            }
            Repr::Map(map) => HeaderList::from_pairs(map),
        })
    }
}

/// Split a combined `set-cookie` value into individual cookies.
///
/// Commas also appear inside `Expires=Wed, 21 Oct 2015 ...`, so a comma only
/// separates cookies when the text after it looks like `name=`.
pub fn split_cookies(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    let mut cookies = Vec::new();
    let mut start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b',' {
            pos += 1;
            continue;
        }

        let mut next = pos + 1;
        while next < bytes.len() && bytes[next].is_ascii_whitespace() {
            next += 1;
        }
        let token_start = next;
        while next < bytes.len() && !matches!(bytes[next], b'=' | b';' | b',') {
            next += 1;
        }

        if next < bytes.len() && bytes[next] == b'=' && next > token_start {
            let cookie = value[start..pos].trim();
            if !cookie.is_empty() {
                cookies.push(cookie.to_string());
            }
            start = token_start;
            pos = token_start;
        } else {
            pos += 1;
        }
    }

    let last = value[start..].trim();
    if !last.is_empty() {
        cookies.push(last.to_string());
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_normalizes_and_overrides() {
        let list = HeaderList::from_pairs([
            ("Accept", "text/html"),
            ("X-Language", "en"),
            ("accept", "application/json"),
        ]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get("ACCEPT"), Some("application/json"));
        assert_eq!(list.iter().next(), Some(("accept", "application/json")));
    }

    #[test]
    fn test_merge_other_wins() {
        let mut caller = HeaderList::from_pairs([("Authorization", "Bearer forged"), ("x-trace", "1")]);
        caller.merge(&HeaderList::from_pairs([("Authorization", "Bearer real")]));
        assert_eq!(caller.get("authorization"), Some("Bearer real"));
        assert_eq!(caller.get("x-trace"), Some("1"));
    }

    #[test]
    fn test_deserialize_map_and_pairs() {
        let from_map: HeaderList = serde_json::from_str(r#"{"X-Language":"de"}"#).unwrap();
        let from_pairs: HeaderList = serde_json::from_str(r#"[["X-Language","de"]]"#).unwrap();
        assert_eq!(from_map, from_pairs);
    }

    #[test]
    fn test_split_cookies_with_expires() {
        let combined = "a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/, b=2; HttpOnly";
        let cookies = split_cookies(combined);
        assert_eq!(
            cookies,
            vec![
                "a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/".to_string(),
                "b=2; HttpOnly".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_single_cookie() {
        assert_eq!(split_cookies("session=abc; Secure"), vec!["session=abc; Secure"]);
    }
}
