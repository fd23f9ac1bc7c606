use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::store::TokenPair;

const GENERIC_FAILURE: &str = "API error";
const SUMMARIZE_FAILURE: &str = "Failed to summarize the file";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Server answered with a non-success status. `message` is the `detail`
    /// field when present, otherwise a fallback.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),

    /// A success response whose body wasn't the expected JSON.
    #[error("unexpected response: {0}")]
    Decode(String),
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// Opaque summary identifier. The server may emit it as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SummaryId(String);

impl SummaryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SummaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SummaryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => SummaryId(s),
            Raw::Number(n) => SummaryId(n.to_string()),
        })
    }
}

/// One row of the history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: SummaryId,
    pub filename: String,
    /// RFC 3339 timestamp as sent by the server
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl AuthResponse {
    /// Both tokens, or nothing. Empty strings count as missing.
    pub fn into_pair(self) -> Option<TokenPair> {
        let access = self.access.filter(|s| !s.is_empty())?;
        let refresh = self.refresh.filter(|s| !s.is_empty())?;
        Some(TokenPair { access, refresh })
    }
}

/// `{summary}`: returned by summarize, preview, and the detail endpoint
/// (which carries extra record fields we don't need).
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryText {
    pub summary: String,
}

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

/// A file to be sent as a multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Request body as the caller hands it over.
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Multipart { field: String, file: FilePart },
}

/// Body after client-side encoding, as the transport sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(String),
    /// Passed through untouched; the transport writes its own boundary header.
    Multipart { field: String, file: FilePart },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Payload>,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// One network round trip. No retries, no queueing.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut req = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req = match request.body {
            None => req,
            Some(Payload::Json(text)) => req.body(text),
            Some(Payload::Multipart { field, file }) => {
                let part = reqwest::multipart::Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(|e| ApiError::Transport(e.to_string()))?;
                req.multipart(reqwest::multipart::Form::new().part(field, part))
            }
        };

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .to_vec();
        Ok(ApiResponse { status, body })
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct ApiClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request and return the parsed JSON body.
    ///
    /// A bearer header is attached when `token` is given. JSON bodies get a
    /// `Content-Type: application/json` header; multipart bodies don't, the
    /// transport supplies its own boundary type.
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<Body>,
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.request_with_fallback(path, method, body, token, GENERIC_FAILURE)
            .await
    }

    async fn request_with_fallback(
        &self,
        path: &str,
        method: Method,
        body: Option<Body>,
        token: Option<&str>,
        fallback: &str,
    ) -> Result<Value, ApiError> {
        let mut headers = Vec::new();
        if let Some(token) = token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        let body = match body {
            None => None,
            Some(Body::Json(value)) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(Payload::Json(value.to_string()))
            }
            Some(Body::Multipart { field, file }) => Some(Payload::Multipart { field, file }),
        };

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        tracing::debug!(%method, %url, authed = token.is_some(), "dispatching request");

        let resp = self
            .transport
            .send(ApiRequest {
                method,
                url,
                headers,
                body,
            })
            .await?;

        if !resp.is_success() {
            let raw = String::from_utf8_lossy(&resp.body);
            tracing::error!(status = resp.status, payload = %raw, "API error response");
            return Err(ApiError::Status {
                status: resp.status,
                message: error_detail(&resp.body).unwrap_or_else(|| fallback.to_string()),
            });
        }

        if resp.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&resp.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // ── Endpoints ─────────────────────────────────────────────────────────────

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/auth/login/", username, password).await
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/auth/register/", username, password).await
    }

    async fn authenticate(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let value = match self.request(path, Method::Post, Some(Body::Json(body)), None).await {
            Ok(value) => value,
            Err(ApiError::Decode(e)) => {
                tracing::warn!(error = %e, "auth response is not JSON");
                return Ok(AuthResponse::default());
            }
            Err(e) => return Err(e),
        };
        // a success body without a token object carries no tokens
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Full history for the session, newest first (server order).
    pub async fn list_summaries(&self, token: Option<&str>) -> Result<Vec<SummaryRecord>, ApiError> {
        let value = self.request("/summaries/", Method::Get, None, token).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        decode(value)
    }

    pub async fn get_summary(&self, id: &SummaryId, token: Option<&str>) -> Result<SummaryText, ApiError> {
        // one path segment, whatever the id contains
        let path = format!("/summaries/{}/", urlencoding::encode(id.as_str()));
        let value = self.request(&path, Method::Get, None, token).await?;
        decode(value)
    }

    /// Summarize and store in history.
    pub async fn summarize(&self, file: &FilePart, token: Option<&str>) -> Result<SummaryText, ApiError> {
        self.upload("/summarize/", file, token).await
    }

    /// Summarize without creating a history record.
    pub async fn preview(&self, file: &FilePart, token: Option<&str>) -> Result<SummaryText, ApiError> {
        self.upload("/upload/", file, token).await
    }

    async fn upload(&self, path: &str, file: &FilePart, token: Option<&str>) -> Result<SummaryText, ApiError> {
        let body = Body::Multipart {
            field: "file".to_string(),
            file: file.clone(),
        };
        let value = self
            .request_with_fallback(path, Method::Post, Some(body), token, SUMMARIZE_FAILURE)
            .await?;
        decode(value)
    }
}

fn decode<D: serde::de::DeserializeOwned>(value: Value) -> Result<D, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// `detail` from an error body, if the body is JSON and carries one.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn client() -> (ApiClient<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::default();
        (ApiClient::new(transport.clone(), "http://api.test/api/"), transport)
    }

    fn pdf() -> FilePart {
        FilePart {
            file_name: "notes.pdf".to_string(),
            mime: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_bearer_header_only_with_token() {
        let (client, transport) = client();
        transport.push_json(200, "[]");
        transport.push_json(200, "[]");

        client.request("/summaries/", Method::Get, None, Some("tok")).await.unwrap();
        client.request("/summaries/", Method::Get, None, None).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header("authorization"), Some("Bearer tok"));
        assert_eq!(sent[1].header("authorization"), None);
        assert_eq!(sent[0].url, "http://api.test/api/summaries/");
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        let (client, transport) = client();
        transport.push_json(200, r#"{"access":"a","refresh":"r"}"#);

        client.login("alice", "secret1").await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
        match &sent[0].body {
            Some(Payload::Json(text)) => {
                let v: Value = serde_json::from_str(text).unwrap();
                assert_eq!(v["username"], "alice");
                assert_eq!(v["password"], "secret1");
            }
            other => panic!("expected json payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multipart_body_passes_through_without_content_type() {
        let (client, transport) = client();
        transport.push_json(200, r#"{"summary":"S"}"#);

        let out = client.summarize(&pdf(), Some("tok")).await.unwrap();
        assert_eq!(out.summary, "S");

        let sent = transport.requests();
        assert_eq!(sent[0].header("content-type"), None);
        assert_eq!(
            sent[0].body,
            Some(Payload::Multipart { field: "file".to_string(), file: pdf() })
        );
    }

    #[tokio::test]
    async fn test_error_uses_detail_field() {
        let (client, transport) = client();
        transport.push_json(400, r#"{"detail":"Username already taken"}"#);

        let err = client.register("alice", "secret1").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status { status: 400, message: "Username already taken".to_string() }
        );
    }

    #[tokio::test]
    async fn test_error_without_detail_uses_fallback() {
        let (client, transport) = client();
        transport.push_json(500, r#"{"error":"boom"}"#);
        transport.push_json(500, r#"{}"#);

        let err = client.request("/summaries/", Method::Get, None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "API error");

        let err = client.summarize(&pdf(), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to summarize the file");
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_generic_failure() {
        let (client, transport) = client();
        transport.push_json(502, "<html>Bad Gateway</html>");

        let err = client.list_summaries(Some("tok")).await.unwrap_err();
        assert_eq!(err, ApiError::Status { status: 502, message: "API error".to_string() });
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_decode_error() {
        let (client, transport) = client();
        transport.push_json(200, "not json");

        let err = client.list_summaries(Some("tok")).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_list_summaries_accepts_numeric_ids_and_null() {
        let (client, transport) = client();
        transport.push_json(
            200,
            r#"[{"id":7,"filename":"a.pdf","created_at":"2024-05-01T10:00:00Z"},
                {"id":"x9","filename":"b.pdf","created_at":"2024-05-02T10:00:00Z"}]"#,
        );
        transport.push_json(200, "null");

        let list = client.list_summaries(Some("tok")).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, SummaryId::new("7"));
        assert_eq!(list[1].id.as_str(), "x9");

        assert!(client.list_summaries(Some("tok")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_summary_path_and_extra_fields() {
        let (client, transport) = client();
        transport.push_json(200, r#"{"id":3,"filename":"a.pdf","summary":"Text","created_at":"x"}"#);

        let detail = client.get_summary(&SummaryId::new("3"), Some("tok")).await.unwrap();
        assert_eq!(detail.summary, "Text");
        assert_eq!(transport.requests()[0].url, "http://api.test/api/summaries/3/");
    }

    #[tokio::test]
    async fn test_get_summary_encodes_id_as_one_segment() {
        let (client, transport) = client();
        transport.push_json(200, r#"{"summary":"Text"}"#);
        transport.push_json(200, r#"{"summary":"Text"}"#);

        client.get_summary(&SummaryId::new("../../auth/login"), Some("tok")).await.unwrap();
        client.get_summary(&SummaryId::new("a?b#c"), Some("tok")).await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].url, "http://api.test/api/summaries/..%2F..%2Fauth%2Flogin/");
        assert_eq!(sent[1].url, "http://api.test/api/summaries/a%3Fb%23c/");
    }

    #[tokio::test]
    async fn test_auth_success_without_token_object_has_no_tokens() {
        let (client, transport) = client();
        transport.push_json(200, "null");
        transport.push_json(200, "");
        transport.push_json(200, "[1,2]");
        transport.push_json(200, "not json");

        for _ in 0..4 {
            let resp = client.login("alice", "secret1").await.unwrap();
            assert_eq!(resp.into_pair(), None);
        }
    }

    #[tokio::test]
    async fn test_preview_hits_upload_endpoint() {
        let (client, transport) = client();
        transport.push_json(200, r#"{"summary":"P"}"#);

        client.preview(&pdf(), Some("tok")).await.unwrap();
        assert_eq!(transport.requests()[0].url, "http://api.test/api/upload/");
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let (client, transport) = client();
        transport.push_failure("connection refused");

        let err = client.list_summaries(None).await.unwrap_err();
        assert_eq!(err, ApiError::Transport("connection refused".to_string()));
    }

    #[test]
    fn test_auth_response_requires_both_tokens() {
        let full: AuthResponse = serde_json::from_str(r#"{"access":"a","refresh":"r"}"#).unwrap();
        assert_eq!(full.into_pair(), Some(TokenPair::new("a", "r")));

        let missing: AuthResponse = serde_json::from_str(r#"{"access":"a"}"#).unwrap();
        assert_eq!(missing.into_pair(), None);

        let empty: AuthResponse = serde_json::from_str(r#"{"access":"a","refresh":""}"#).unwrap();
        assert_eq!(empty.into_pair(), None);
    }
}
