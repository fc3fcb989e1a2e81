// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::models::{ApiResponse, BuildStatus, NamespaceStatus, TokenRequest};
use crate::poll::{poll_until, PollPolicy, PollStep};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_USERNAME: &str = "username";
const DEFAULT_PASSWORD: &str = "password";

/// Client for the envstore REST API.
///
/// Holds the server base URL and a bearer token. The token is either
/// supplied up front or obtained once during [`EnvstoreClientBuilder::connect`]
/// via the login exchange; it is never mutated afterward.
#[derive(Debug, Clone)]
pub struct EnvstoreClient {
    http: Client,
    base_url: String,
    token: String,
    auth_value: HeaderValue,
}

impl EnvstoreClient {
    /// Create a client builder for the server at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> EnvstoreClientBuilder {
        EnvstoreClientBuilder::new(base_url)
    }

    /// The bearer token this client authenticates with.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate a random namespace name: 32 lowercase hex characters.
    pub fn gen_random_namespace() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Perform one API request.
    ///
    /// Joins `base_url` and `endpoint`, merges `headers` and then injects
    /// `Authorization: Bearer <token>` (the auth header always wins), sends
    /// `body` as JSON when present, and applies `timeout` in place of the
    /// client default of 10 seconds. Non-2xx responses become
    /// [`ClientError::HttpStatus`] carrying the status code and body.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        headers: Option<HeaderMap>,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!(target: "client", %method, %url, "sending request");

        let mut merged = headers.unwrap_or_default();
        merged.insert(AUTHORIZATION, self.auth_value.clone());

        let mut request = self.http.request(method, &url).headers(merged);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let response_body = response.text().await?;
        trace!(target: "client", %status, body = %response_body, "response received");

        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status,
                body: response_body,
            });
        }

        Ok(ApiResponse {
            status,
            headers: response_headers,
            body: response_body,
        })
    }

    /// Create a namespace and wait for it to reach a terminal status.
    ///
    /// With no `namespace` given, a random hex name is generated; the server
    /// is not consulted for uniqueness. Both `ok` and `error` end the poll
    /// and return the status response as-is, so callers can inspect an
    /// `error` outcome rather than catching it.
    ///
    /// # Example
    /// ```no_run
    /// # use envstore_client::{EnvstoreClient, PollPolicy};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = EnvstoreClient::builder("http://127.0.0.1:8080")
    ///     .token("dev-token")
    ///     .connect()
    ///     .await?;
    /// let response = client
    ///     .create_namespace(Some("team-a"), &PollPolicy::default())
    ///     .await?;
    /// println!("{}", response.body);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_namespace(
        &self,
        namespace: Option<&str>,
        policy: &PollPolicy,
    ) -> Result<ApiResponse> {
        let namespace = match namespace {
            Some(name) => name.to_string(),
            None => Self::gen_random_namespace(),
        };

        self.request(
            Method::POST,
            &format!("api/v1/namespace/{namespace}"),
            None,
            None,
            None,
        )
        .await?;

        let operation = format!("creation of namespace {namespace}");
        poll_until(&operation, policy, || self.namespace_status_step(&namespace)).await
    }

    async fn namespace_status_step(&self, namespace: &str) -> Result<PollStep<ApiResponse>> {
        let response = self
            .request(
                Method::GET,
                &format!("api/v1/namespace/{namespace}"),
                None,
                None,
                None,
            )
            .await?;
        let value = response.json_value()?;
        let status: NamespaceStatus = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingField("status"))?
            .parse()?;

        if status.is_terminal() {
            Ok(PollStep::Terminal(response))
        } else {
            Ok(PollStep::Pending(value))
        }
    }

    /// Submit the specification file at `specification_path` for `namespace`
    /// and wait for the resulting build to reach a terminal status.
    ///
    /// `FAILED` and `CANCELED` are terminal results, not errors; the caller
    /// inspects the returned body to distinguish outcomes.
    pub async fn create_environment(
        &self,
        namespace: &str,
        specification_path: &Path,
        policy: &PollPolicy,
    ) -> Result<ApiResponse> {
        let specification = std::fs::read_to_string(specification_path)?;

        let response = self
            .request(
                Method::POST,
                "api/v1/specification",
                Some(&json!({
                    "namespace": namespace,
                    "specification": specification,
                })),
                None,
                None,
            )
            .await?;

        let value = response.json_value()?;
        let build_id = build_id_from(&value)?;
        debug!(target: "client", namespace, build_id = %build_id, "specification submitted");

        let operation = format!("build {build_id}");
        poll_until(&operation, policy, || self.build_status_step(&build_id)).await
    }

    async fn build_status_step(&self, build_id: &str) -> Result<PollStep<ApiResponse>> {
        let response = self
            .request(
                Method::GET,
                &format!("api/v1/build/{build_id}/"),
                None,
                None,
                None,
            )
            .await?;
        let value = response.json_value()?;
        let status: BuildStatus = value
            .get("data")
            .and_then(|data| data.get("status"))
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingField("data.status"))?
            .parse()?;

        if status.is_terminal() {
            Ok(PollStep::Terminal(response))
        } else {
            Ok(PollStep::Pending(value))
        }
    }

    /// Mint a scoped token binding `role` on everything under `namespace`.
    /// The token expires one hour out.
    pub async fn mint_token(
        &self,
        namespace: &str,
        role: &str,
        primary_namespace: &str,
    ) -> Result<ApiResponse> {
        let expiration = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let body = serde_json::to_value(TokenRequest::scoped(
            namespace,
            role,
            primary_namespace,
            expiration,
        ))?;
        self.request(Method::POST, "api/v1/token", Some(&body), None, None)
            .await
    }

    /// Delete an environment. No polling; the raw response is returned.
    pub async fn delete_environment(
        &self,
        namespace: &str,
        environment_name: &str,
    ) -> Result<ApiResponse> {
        self.request(
            Method::DELETE,
            &format!("api/v1/environment/{namespace}/{environment_name}"),
            None,
            None,
            None,
        )
        .await
    }

    /// Delete a namespace. No polling; the raw response is returned.
    pub async fn delete_namespace(&self, namespace: &str) -> Result<ApiResponse> {
        self.request(
            Method::DELETE,
            &format!("api/v1/namespace/{namespace}"),
            None,
            None,
            None,
        )
        .await
    }
}

/// The submission endpoint reports `data.build_id` as a string or an
/// integer depending on server version; either way it is only ever
/// interpolated into the build-status path.
fn build_id_from(value: &Value) -> Result<String> {
    let build_id = value
        .get("data")
        .and_then(|data| data.get("build_id"))
        .ok_or(ClientError::MissingField("data.build_id"))?;

    match build_id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ClientError::MissingField("data.build_id")),
    }
}

/// Builder for configuring an envstore client.
///
/// [`connect`](Self::connect) finalizes the client, performing the login
/// exchange when no token was supplied.
#[derive(Debug)]
pub struct EnvstoreClientBuilder {
    base_url: String,
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl EnvstoreClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a pre-issued bearer token and skip the login exchange.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Credentials for the login exchange. Without these (and without a
    /// token) the test-deployment defaults `username`/`password` are used.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Default request timeout (10 seconds unless overridden).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Finalize the client, logging in first when no token was supplied.
    /// Fails if the base URL is invalid or the login exchange is rejected.
    pub async fn connect(self) -> Result<EnvstoreClient> {
        Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;
        let base_url = self.base_url.trim_end_matches('/').to_string();

        let token = match self.token {
            Some(token) => token,
            None => {
                let username = self.username.as_deref().unwrap_or(DEFAULT_USERNAME);
                let password = self.password.as_deref().unwrap_or(DEFAULT_PASSWORD);
                login(&base_url, self.timeout, username, password).await?
            }
        };

        let auth_value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::Authentication("token is not a valid header value".into()))?;

        let http = Client::builder().timeout(self.timeout).build()?;

        Ok(EnvstoreClient {
            http,
            base_url,
            token,
            auth_value,
        })
    }
}

/// Two-step login exchange: POST credentials to `/login` to obtain session
/// cookies, then present those cookies to `/api/v1/token` to mint a bearer
/// token. Runs on a short-lived cookie-enabled client; the session client
/// itself never stores cookies.
async fn login(base_url: &str, timeout: Duration, username: &str, password: &str) -> Result<String> {
    let login_client = Client::builder()
        .timeout(timeout)
        .cookie_store(true)
        .build()?;

    debug!(target: "auth", %base_url, username, "logging in");
    let login_response = login_client
        .post(format!("{base_url}/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    if !login_response.status().is_success() {
        return Err(ClientError::Authentication(format!(
            "login rejected with status {}",
            login_response.status()
        )));
    }

    let token_response = login_client
        .post(format!("{base_url}/api/v1/token"))
        .send()
        .await?;
    if !token_response.status().is_success() {
        return Err(ClientError::Authentication(format!(
            "token exchange rejected with status {}",
            token_response.status()
        )));
    }

    let value: Value = token_response.json().await?;
    let token = value
        .get("data")
        .and_then(|data| data.get("token"))
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ClientError::Authentication("token missing from exchange response".to_string())
        })?;

    debug!(target: "auth", "bearer token obtained");
    Ok(token.to_string())
}
