//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("navisync/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Retry with exponential backoff for transport failures and 5xx
/// - TLS via rustls
///
/// 429 responses are handed back on the first attempt; throttling is the
/// catalog clients' concern.
pub struct ReqwestHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used by [`HttpClient::execute`].
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    async fn into_bridge_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.without_url().to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Request URL without its query string.
    ///
    /// Subsonic carries the salted auth token in the query, so only the
    /// path is fit for logs.
    fn loggable_url(url: &str) -> &str {
        url.split_once('?').map_or(url, |(path, _)| path)
    }

    /// Map a transport failure, dropping the URL reqwest embeds in it.
    fn classify_transport_error(error: reqwest::Error) -> BridgeError {
        let error = error.without_url();
        if error.is_timeout() {
            BridgeError::OperationFailed("Request timed out".to_string())
        } else if error.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", error))
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }

    /// Execute request with retry logic
    async fn execute_with_retry_internal(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let final_attempt = attempt >= max_attempts;

            debug!(
                attempt,
                max_attempts,
                url = %Self::loggable_url(&request.url),
                "Executing HTTP request"
            );

            match self.build_request(request.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status < 500 || final_attempt {
                        return Self::into_bridge_response(response).await;
                    }
                    warn!(status, attempt, "HTTP request failed with server error");
                }
                Err(e) => {
                    let error = Self::classify_transport_error(e);
                    warn!(
                        error = %error,
                        url = %Self::loggable_url(&request.url),
                        attempt,
                        "HTTP request failed"
                    );
                    if final_attempt {
                        return Err(error);
                    }
                }
            }

            let delay = policy.delay_for(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, self.policy.clone()).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = ReqwestHttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[tokio::test]
    async fn test_connection_failure_surfaces_after_retries() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2))
            .unwrap()
            .with_retry_policy(RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                use_exponential_backoff: false,
            });

        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let request = HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/unreachable");
        let result = client.execute(request).await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_transport_error_omits_query_credentials() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2))
            .unwrap()
            .with_retry_policy(RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                use_exponential_backoff: false,
            });

        let request = HttpRequest::new(
            HttpMethod::Get,
            "http://127.0.0.1:9/rest/ping.view?u=admin&t=SECRETTOKEN&s=SALT",
        );
        let err = client.execute(request).await.unwrap_err();

        let message = err.to_string();
        assert!(!message.contains("SECRETTOKEN"), "{}", message);
        assert!(!message.contains("SALT"), "{}", message);
    }

    #[test]
    fn test_loggable_url_drops_query() {
        assert_eq!(
            ReqwestHttpClient::loggable_url("http://nd.test/rest/ping.view?u=a&t=x&s=y"),
            "http://nd.test/rest/ping.view"
        );
        assert_eq!(
            ReqwestHttpClient::loggable_url("https://api.test/v1/me/playlists"),
            "https://api.test/v1/me/playlists"
        );
    }
}
