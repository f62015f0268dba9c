//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Response headers with lower-cased names, in wire order
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header value with the given name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a HEAD request, with an If-None-Match header when given
    async fn head(&self, url: &str, if_none_match: Option<&str>) -> crate::Result<HttpResponse>;

    /// Send a GET request, with an If-None-Match header when given
    async fn get(&self, url: &str, if_none_match: Option<&str>) -> crate::Result<HttpResponse>;

    /// Send a POST request with form-encoded body
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client with the given per-request timeout
    ///
    /// Redirects are never followed, so 3xx responses surface to the
    /// caller with their Location header intact.
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| crate::VigilError::Http(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn head(&self, url: &str, if_none_match: Option<&str>) -> crate::Result<HttpResponse> {
        tracing::debug!("HEAD {}", url);
        let mut request = self.client.head(url);
        if let Some(etag) = if_none_match {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }
        let response = request
            .send()
            .await
            .map_err(|e| crate::VigilError::Http(format!("HEAD {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| crate::VigilError::Http(format!("Reading response body: {}", e)))?
            .to_vec();

        tracing::debug!("HEAD {} -> {}", url, status);
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn get(&self, url: &str, if_none_match: Option<&str>) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let mut request = self.client.get(url);
        if let Some(etag) = if_none_match {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }
        let response = request
            .send()
            .await
            .map_err(|e| crate::VigilError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| crate::VigilError::Http(format!("Reading response body: {}", e)))?
            .to_vec();

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| crate::VigilError::Http(format!("POST {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| crate::VigilError::Http(format!("Reading response body: {}", e)))?
            .to_vec();

        tracing::debug!("POST {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
