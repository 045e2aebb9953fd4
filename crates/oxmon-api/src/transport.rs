use crate::error::{AdminError, Result};
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::time::Duration;

const HTTP_PREFIX: &str = "http://";
const GZIP_CONTENT_TYPE: &str = "application/x-gzip";

/// Status, `Location` header and (inflated) body of one backend reply.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// Thin HTTP client shared by every backend protocol.
///
/// Each call has the fixed timeout given at construction and is never
/// retried here; a transport failure aborts the caller's sequence.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    headers: HeaderMap,
    hostname: String,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(AdminError::Client)?;
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            client,
            headers: HeaderMap::new(),
            hostname,
        })
    }

    /// Extra headers sent with every request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Hostname of this machine, used to sign commands and pick a query source.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Builds `http://<addr>/<paths joined by '/'>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxmon_api::transport::ApiClient;
    ///
    /// assert_eq!(ApiClient::url("localhost:9000", &["id"]), "http://localhost:9000/id");
    /// assert_eq!(
    ///     ApiClient::url("http://10.0.0.1:9001", &["agents", "a1", "cmd"]),
    ///     "http://10.0.0.1:9001/agents/a1/cmd"
    /// );
    /// assert_eq!(ApiClient::url("localhost:9002", &[]), "http://localhost:9002/");
    /// ```
    pub fn url(addr: &str, paths: &[&str]) -> String {
        let addr = addr.strip_prefix(HTTP_PREFIX).unwrap_or(addr);
        let slash = match paths.first() {
            Some(first) if first.starts_with('/') => "",
            _ => "/",
        };
        format!("{HTTP_PREFIX}{addr}{slash}{}", paths.join("/"))
    }

    /// GET that only checks for a 200 reply.
    pub async fn ping(&self, url: &str) -> Result<()> {
        let resp = self.get(url).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("GET", url, resp.status.as_u16(), 200, &resp.body));
        }
        Ok(())
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<ApiResponse> {
        let bytes = serde_json::to_vec(body)?;
        self.send(Method::POST, url, Some(bytes)).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<ApiResponse> {
        let bytes = serde_json::to_vec(body)?;
        self.send(Method::PUT, url, Some(bytes)).await
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, url, None).await
    }

    async fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<ApiResponse> {
        let transport_err = |source| AdminError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };

        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(transport_err)?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let gzipped = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct == GZIP_CONTENT_TYPE);

        let raw = response.bytes().await.map_err(transport_err)?;
        let body = if gzipped {
            let mut inflated = Vec::new();
            GzDecoder::new(raw.as_ref())
                .read_to_end(&mut inflated)
                .map_err(|source| AdminError::Decode {
                    method: method.to_string(),
                    url: url.to_string(),
                    source,
                })?;
            inflated
        } else {
            raw.to_vec()
        };

        tracing::debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            "backend reply"
        );

        Ok(ApiResponse {
            status,
            location,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn client() -> ApiClient {
        ApiClient::new(Duration::from_secs(5))
            .expect("client should build")
            .with_hostname("db1")
    }

    #[test]
    fn url_keeps_leading_slash_of_first_segment() {
        assert_eq!(
            ApiClient::url("localhost:9001", &["/instances/abc"]),
            "http://localhost:9001/instances/abc"
        );
    }

    #[tokio::test]
    async fn get_inflates_gzip_bodies() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"agent-42").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/id")
            .with_status(200)
            .with_header("content-type", GZIP_CONTENT_TYPE)
            .with_body(compressed)
            .create_async()
            .await;

        let url = ApiClient::url(&server.host_with_port(), &["id"]);
        let resp = client().get(&url).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.text(), "agent-42");
    }

    #[tokio::test]
    async fn custom_headers_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/node_exporter/9100")
            .match_header("x-oxmon-token", "secret")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-oxmon-token", "secret".parse().unwrap());
        let api = client().with_headers(headers);
        let url = ApiClient::url(&server.host_with_port(), &["node_exporter", "9100"]);
        let resp = api.delete(&url).await.unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn location_header_is_captured() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/instances")
            .with_status(201)
            .with_header("location", "/instances/abc")
            .create_async()
            .await;

        let url = ApiClient::url(&server.host_with_port(), &["instances"]);
        let resp = client().post_json(&url, &serde_json::json!({})).await.unwrap();
        assert_eq!(resp.location.as_deref(), Some("/instances/abc"));
    }

    #[tokio::test]
    async fn ping_rejects_non_ok_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ping")
            .with_status(503)
            .create_async()
            .await;

        let url = ApiClient::url(&server.host_with_port(), &["ping"]);
        let err = client().ping(&url).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let err = client().get("http://127.0.0.1:9/id").await.unwrap_err();
        assert!(matches!(err, AdminError::Transport { .. }), "got {err}");
    }
}
