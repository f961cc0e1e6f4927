//! HTTP client used to talk to the release-hosting API.

use std::time::Duration;

use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::status::{classify_status, transport_error};
use crate::provider::GatewayError;

/// Thin wrapper over a reqwest [`Client`] that reports failures as
/// [`GatewayError`]s. Every call issues exactly one request.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    /// Total time allowed for an API call. Downloads are only bounded by the
    /// client's connect and read timeouts.
    api_timeout: Option<Duration>,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_timeout: None,
        }
    }

    /// Builds a client that identifies itself to the API and, when a token is
    /// given, authenticates with it as a bearer token.
    ///
    /// `timeout` bounds whole API calls, and each connect or read of a
    /// download.
    pub fn with_token(token: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("squirrel-relay/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        let mut http = Self::new(client);
        http.api_timeout = Some(timeout);
        Ok(http)
    }

    /// Performs a GET request with query parameters and deserializes the JSON response.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        debug!("GET JSON from {} with query {:?}...", url, query);

        let mut request = self.client.get(url).query(query);
        if let Some(timeout) = self.api_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("Failed to send request", e))?;

        let response = Self::check_status(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| transport_error("Failed to parse JSON response", e))
    }

    /// Downloads a response body into memory.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let mut body = Vec::new();
        self.get_chunks(url, |chunk| body.extend_from_slice(chunk))
            .await?;
        Ok(body)
    }

    /// Streams a response body, handing each chunk to `on_chunk` as it
    /// arrives. Returns the number of bytes read.
    #[tracing::instrument(skip(self, on_chunk))]
    pub async fn get_chunks<F>(&self, url: &str, mut on_chunk: F) -> Result<u64, GatewayError>
    where
        F: FnMut(&[u8]),
    {
        debug!("Downloading {}...", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("Failed to start download request", e))?;

        let mut response = Self::check_status(response).await?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error("Failed to read download stream", e))?
        {
            on_chunk(&chunk);
            downloaded_bytes += chunk.len() as u64;
        }

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }

    async fn check_status(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &headers, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_get_json_with_query_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test?page=1&per_page=10")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"["item1", "item2"]"#)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Vec<String> = client
            .get_json_with_query(
                &format!("{}/test", url),
                &[("page", "1"), ("per_page", "10")],
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result, vec!["item1", "item2"]);
    }

    #[tokio::test]
    async fn test_get_json_not_found() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Result<serde_json::Value, _> = client
            .get_json_with_query(&format!("{}/test", url), &[])
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(GatewayError::RepoNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_json_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/test")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Result<Vec<String>, _> = client
            .get_json_with_query(&format!("{}/test", url), &[])
            .await;

        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let result: Result<serde_json::Value, _> = client
            .get_json_with_query(&format!("{}/test", url), &[])
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn test_get_bytes_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/file.nupkg")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let bytes = client
            .get_bytes(&format!("{}/file.nupkg", url))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"test content");
    }

    #[tokio::test]
    async fn test_with_token_sends_bearer_header() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/secure")
            .match_header("authorization", "Bearer s3cret")
            .match_header("user-agent", mockito::Matcher::Regex("^squirrel-relay/".into()))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let client = HttpClient::with_token(Some("s3cret"), Duration::from_secs(5)).unwrap();
        let bytes = client.get_bytes(&format!("{}/secure", url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"ok");
    }

    #[tokio::test]
    async fn test_get_chunks_counts_streamed_bytes() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/file.nupkg")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..4 {
                    w.write_all(&[7u8; 1024])?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let client = HttpClient::new(Client::new());
        let mut seen = 0usize;
        let total = client
            .get_chunks(&format!("{}/file.nupkg", url), |chunk| seen += chunk.len())
            .await
            .unwrap();

        assert_eq!(total, 4096);
        assert_eq!(seen, 4096);
    }

    #[tokio::test]
    async fn test_slow_download_outlasting_timeout_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        // 8 chunks, 300ms apart: longer in total than the timeout, never idle
        // for as long as it.
        let _mock = server
            .mock("GET", "/large.nupkg")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..8 {
                    w.write_all(&[1u8; 1024])?;
                    std::thread::sleep(Duration::from_millis(300));
                }
                Ok(())
            })
            .create_async()
            .await;

        let client = HttpClient::with_token(None, Duration::from_secs(1)).unwrap();
        let total = client
            .get_chunks(&format!("{}/large.nupkg", url), |_| {})
            .await
            .unwrap();

        assert_eq!(total, 8 * 1024);
    }
}
