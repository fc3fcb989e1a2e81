// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::str::FromStr;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Lifecycle of a server-side environment build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Queued,
    Building,
    Completed,
    Failed,
    Canceled,
}

impl BuildStatus {
    /// Terminal statuses end the build poll loop. `Failed` and `Canceled`
    /// are terminal outcomes, not errors; callers inspect the response.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl FromStr for BuildStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "BUILDING" => Ok(Self::Building),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(ClientError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Building => write!(f, "BUILDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// Lifecycle of a namespace as reported by the status endpoint. Wire values
/// are lowercase; `ok` and `error` are the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceStatus {
    Queued,
    Building,
    Ok,
    Error,
}

impl NamespaceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Error)
    }
}

impl FromStr for NamespaceStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "building" => Ok(Self::Building),
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            other => Err(ClientError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for NamespaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Building => write!(f, "building"),
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Raw response captured from the server: status line, headers, and body
/// text, with JSON accessors layered on top.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// Parse the body as arbitrary JSON.
    pub fn json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Deserialize the body into a typed shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Request body for minting a scoped token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub primary_namespace: String,
    pub expiration: String,
    pub role_bindings: HashMap<String, Vec<String>>,
}

impl TokenRequest {
    /// Bind `role` on everything under `namespace`, expiring at `expiration`
    /// (RFC 3339).
    pub fn scoped(
        namespace: &str,
        role: &str,
        primary_namespace: &str,
        expiration: String,
    ) -> Self {
        let mut role_bindings = HashMap::new();
        role_bindings.insert(format!("{namespace}/*"), vec![role.to_string()]);
        Self {
            primary_namespace: primary_namespace.to_string(),
            expiration,
            role_bindings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_status_parses_known_values() {
        assert_eq!("QUEUED".parse::<BuildStatus>().unwrap(), BuildStatus::Queued);
        assert_eq!(
            "BUILDING".parse::<BuildStatus>().unwrap(),
            BuildStatus::Building
        );
        assert_eq!(
            "COMPLETED".parse::<BuildStatus>().unwrap(),
            BuildStatus::Completed
        );
        assert_eq!("FAILED".parse::<BuildStatus>().unwrap(), BuildStatus::Failed);
        assert_eq!(
            "CANCELED".parse::<BuildStatus>().unwrap(),
            BuildStatus::Canceled
        );
    }

    #[test]
    fn build_status_rejects_unknown_values() {
        let err = "WEIRD".parse::<BuildStatus>().unwrap_err();
        assert!(matches!(err, ClientError::UnknownStatus(s) if s == "WEIRD"));
        // Case matters on the wire.
        assert!("completed".parse::<BuildStatus>().is_err());
    }

    #[test]
    fn build_status_terminal_set() {
        assert!(!BuildStatus::Queued.is_terminal());
        assert!(!BuildStatus::Building.is_terminal());
        assert!(BuildStatus::Completed.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
        assert!(BuildStatus::Canceled.is_terminal());
    }

    #[test]
    fn namespace_status_parses_and_classifies() {
        assert_eq!(
            "building".parse::<NamespaceStatus>().unwrap(),
            NamespaceStatus::Building
        );
        assert!(!NamespaceStatus::Building.is_terminal());
        assert!(!NamespaceStatus::Queued.is_terminal());
        assert!(NamespaceStatus::Ok.is_terminal());
        assert!(NamespaceStatus::Error.is_terminal());
        assert!("WEIRD".parse::<NamespaceStatus>().is_err());
        // Uppercase is not the namespace wire format.
        assert!("OK".parse::<NamespaceStatus>().is_err());
    }

    #[test]
    fn token_request_binds_namespace_wildcard() {
        let request = TokenRequest::scoped(
            "team-a",
            "developer",
            "default",
            "2026-08-07T12:00:00+00:00".to_string(),
        );
        assert_eq!(request.primary_namespace, "default");
        assert_eq!(
            request.role_bindings.get("team-a/*").map(Vec::as_slice),
            Some(&["developer".to_string()][..])
        );
    }

    #[test]
    fn api_response_json_accessors() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: r#"{"status":"ok"}"#.to_string(),
        };
        let value = response.json_value().unwrap();
        assert_eq!(value["status"], "ok");

        #[derive(Deserialize)]
        struct Envelope {
            status: NamespaceStatus,
        }
        let envelope: Envelope = response.json().unwrap();
        assert_eq!(envelope.status, NamespaceStatus::Ok);
    }
}
