//! Conditional-request strategy for change detection
//!
//! Each check revalidates cheaply with HEAD when an ETag is cached and
//! escalates to a full GET whenever HEAD cannot prove the content is
//! unchanged. HEAD is an optimization, never authoritative on failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::diff;
use crate::io::{HttpClient, HttpResponse, ReqwestHttpClient};
use crate::outcome::{select_headers, Method, RequestResult};

/// Fixed timeout for one-shot validation probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Last seen content of a monitored url, kept for revalidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationCache {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Runs checks against monitored urls using conditional requests
pub struct Checker {
    http: Arc<dyn HttpClient>,
}

impl Checker {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Check a url for changes against the cached content
    ///
    /// Never fails: transport errors become transfer-error results. The
    /// returned cache replaces the caller's copy; on failure it is the
    /// input cache, untouched.
    pub async fn check(
        &self,
        url: &str,
        cache: Option<RevalidationCache>,
    ) -> (RequestResult, Option<RevalidationCache>) {
        let started = Instant::now();

        if let Some(etag) = cache.as_ref().and_then(|c| c.etag.clone()) {
            match self.http.head(url, Some(etag.as_str())).await {
                Ok(response) => {
                    // A matching ETag proves the content unchanged no matter
                    // what status code came with it
                    if response.header("etag") == Some(etag.as_str()) || response.status == 304 {
                        return (head_unchanged(&response, started), cache);
                    }
                    tracing::debug!(
                        "HEAD {} inconclusive (status {}), escalating to GET",
                        url,
                        response.status
                    );
                }
                Err(e) => {
                    tracing::debug!("HEAD {} failed ({}), escalating to GET", url, e);
                }
            }
        }

        self.fetch(url, cache, started).await
    }

    /// Full GET, conditional when an ETag is cached
    async fn fetch(
        &self,
        url: &str,
        mut cache: Option<RevalidationCache>,
        started: Instant,
    ) -> (RequestResult, Option<RevalidationCache>) {
        let etag = cache.as_ref().and_then(|c| c.etag.clone());
        let response = match self.http.get(url, etag.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                let result =
                    RequestResult::transfer_error(Method::Get, e.to_string(), elapsed_ms(started));
                return (result, cache);
            }
        };

        let mut result = RequestResult {
            timestamp: Utc::now(),
            method: Method::Get,
            status_code: Some(response.status),
            revalidated: false,
            byte_size: response.body.len() as u64,
            duration_ms: elapsed_ms(started),
            error: None,
            headers: select_headers(&response.headers),
            diff: None,
        };

        if response.status == 304 {
            result.revalidated = true;
            if let (Some(cached), Some(new_etag)) = (cache.as_mut(), response.header("etag")) {
                cached.etag = Some(new_etag.to_string());
            }
            return (result, cache);
        }

        // Redirects and error codes leave the cached content alone
        if !(200..300).contains(&response.status) {
            return (result, cache);
        }

        let response_etag = response.header("etag").map(str::to_string);
        match cache.take() {
            None => {
                let fresh = RevalidationCache {
                    body: response.body,
                    etag: response_etag,
                };
                (result, Some(fresh))
            }
            Some(mut cached) if cached.body == response.body => {
                if response_etag.is_some() {
                    cached.etag = response_etag;
                }
                (result, Some(cached))
            }
            Some(cached) => {
                let old_text = String::from_utf8_lossy(&cached.body);
                let new_text = String::from_utf8_lossy(&response.body);
                result.diff = Some(diff::diff(&old_text, &new_text));
                let fresh = RevalidationCache {
                    body: response.body,
                    etag: response_etag,
                };
                (result, Some(fresh))
            }
        }
    }
}

/// One-shot reachability probe with the short fixed timeout and no cache
pub async fn probe(url: &str) -> crate::Result<RequestResult> {
    let client = ReqwestHttpClient::new(PROBE_TIMEOUT)?;
    let checker = Checker::new(Arc::new(client));
    let (result, _) = checker.check(url, None).await;
    Ok(result)
}

fn head_unchanged(response: &HttpResponse, started: Instant) -> RequestResult {
    let byte_size = response
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    RequestResult {
        timestamp: Utc::now(),
        method: Method::Head,
        status_code: Some(response.status),
        revalidated: true,
        byte_size,
        duration_ms: elapsed_ms(started),
        error: None,
        headers: select_headers(&response.headers),
        diff: None,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MockHttpClient;
    use crate::outcome::Status;

    const URL: &str = "https://example.test/page";

    fn response(status: u16, body: &str, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn cached(body: &str, etag: Option<&str>) -> RevalidationCache {
        RevalidationCache {
            body: body.as_bytes().to_vec(),
            etag: etag.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn first_check_fetches_a_baseline() {
        let mut mock = MockHttpClient::new();
        mock.expect_head().times(0);
        mock.expect_get()
            .withf(|url, inm| url == URL && inm.is_none())
            .returning(|_, _| {
                Box::pin(async { Ok(response(200, "hello", &[("etag", "\"v1\"")])) })
            });

        let checker = Checker::new(Arc::new(mock));
        let (result, cache) = checker.check(URL, None).await;

        assert_eq!(result.method, Method::Get);
        assert_eq!(result.status(), Status::Success { changed: false });
        assert!(result.diff.is_none());
        assert_eq!(result.byte_size, 5);
        let cache = cache.unwrap();
        assert_eq!(cache.body, b"hello");
        assert_eq!(cache.etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn matching_head_etag_skips_the_get() {
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .withf(|url, inm| url == URL && *inm == Some("\"v1\""))
            .returning(|_, _| {
                Box::pin(async {
                    Ok(response(
                        200,
                        "",
                        &[("etag", "\"v1\""), ("content-length", "5")],
                    ))
                })
            });
        mock.expect_get().times(0);

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", Some("\"v1\""));
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.method, Method::Head);
        assert_eq!(result.status(), Status::Success { changed: false });
        assert_eq!(result.byte_size, 5);
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn head_304_skips_the_get() {
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .returning(|_, _| Box::pin(async { Ok(response(304, "", &[])) }));
        mock.expect_get().times(0);

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", Some("\"v1\""));
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.method, Method::Head);
        assert_eq!(result.status_code, Some(304));
        assert_eq!(result.status(), Status::Success { changed: false });
        assert!(result.diff.is_none());
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn matching_head_etag_wins_over_an_error_status() {
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .returning(|_, _| Box::pin(async { Ok(response(503, "", &[("etag", "\"v1\"")])) }));
        mock.expect_get().times(0);

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", Some("\"v1\""));
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.status(), Status::Success { changed: false });
        assert_eq!(result.status_code, Some(503));
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn head_with_different_etag_escalates_to_get() {
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .returning(|_, _| Box::pin(async { Ok(response(200, "", &[("etag", "\"v2\"")])) }));
        mock.expect_get()
            .withf(|url, inm| url == URL && *inm == Some("\"v1\""))
            .returning(|_, _| {
                Box::pin(async { Ok(response(200, "world", &[("etag", "\"v2\"")])) })
            });

        let checker = Checker::new(Arc::new(mock));
        let (result, cache) = checker.check(URL, Some(cached("hello", Some("\"v1\"")))).await;

        assert_eq!(result.status(), Status::Success { changed: true });
        let diff = result.diff.unwrap();
        assert_eq!(diff.total_changed_lines, 1);
        let cache = cache.unwrap();
        assert_eq!(cache.body, b"world");
        assert_eq!(cache.etag.as_deref(), Some("\"v2\""));
    }

    #[tokio::test]
    async fn head_transport_failure_escalates_to_get() {
        let mut mock = MockHttpClient::new();
        mock.expect_head().returning(|_, _| {
            Box::pin(async { Err(crate::VigilError::Http("timeout".to_string())) })
        });
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(response(200, "hello", &[])) }));

        let checker = Checker::new(Arc::new(mock));
        let (result, cache) = checker.check(URL, Some(cached("hello", Some("\"v1\"")))).await;

        assert_eq!(result.method, Method::Get);
        assert_eq!(result.status(), Status::Success { changed: false });
        assert_eq!(cache.unwrap().body, b"hello");
    }

    #[tokio::test]
    async fn head_error_status_escalates_to_get() {
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .returning(|_, _| Box::pin(async { Ok(response(500, "", &[])) }));
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(response(200, "hello", &[])) }));

        let checker = Checker::new(Arc::new(mock));
        let (result, _) = checker.check(URL, Some(cached("hello", Some("\"v1\"")))).await;

        assert_eq!(result.method, Method::Get);
        assert_eq!(result.status_code, Some(200));
    }

    #[tokio::test]
    async fn cache_without_etag_goes_straight_to_get() {
        let mut mock = MockHttpClient::new();
        mock.expect_head().times(0);
        mock.expect_get()
            .withf(|_, inm| inm.is_none())
            .returning(|_, _| Box::pin(async { Ok(response(200, "a\nc", &[])) }));

        let checker = Checker::new(Arc::new(mock));
        let (result, cache) = checker.check(URL, Some(cached("a\nb", None))).await;

        let diff = result.diff.unwrap();
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].line, 2);
        assert_eq!(cache.unwrap().body, b"a\nc");
    }

    #[tokio::test]
    async fn equal_body_refreshes_the_etag() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(response(200, "same", &[("etag", "\"v9\"")])) }));

        let checker = Checker::new(Arc::new(mock));
        let (result, cache) = checker.check(URL, Some(cached("same", None))).await;

        assert!(result.diff.is_none());
        let cache = cache.unwrap();
        assert_eq!(cache.body, b"same");
        assert_eq!(cache.etag.as_deref(), Some("\"v9\""));
    }

    #[tokio::test]
    async fn get_304_keeps_the_cache() {
        let mut mock = MockHttpClient::new();
        mock.expect_head()
            .returning(|_, _| Box::pin(async { Ok(response(200, "", &[])) }));
        mock.expect_get()
            .withf(|_, inm| *inm == Some("\"v1\""))
            .returning(|_, _| Box::pin(async { Ok(response(304, "", &[])) }));

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", Some("\"v1\""));
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.status_code, Some(304));
        assert_eq!(result.status(), Status::Success { changed: false });
        assert!(result.diff.is_none());
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_cache() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_, _| {
            Box::pin(async { Err(crate::VigilError::Http("connection refused".to_string())) })
        });

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", None);
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.status(), Status::TransferError);
        assert!(result.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn error_status_keeps_the_cache() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .returning(|_, _| Box::pin(async { Ok(response(404, "not found", &[])) }));

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", None);
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.status(), Status::ClientError);
        assert!(result.diff.is_none());
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn redirect_is_recorded_with_its_location() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_, _| {
            Box::pin(async {
                Ok(response(
                    301,
                    "",
                    &[
                        ("content-type", "text/html"),
                        ("location", "https://example.test/moved"),
                    ],
                ))
            })
        });

        let checker = Checker::new(Arc::new(mock));
        let before = cached("hello", None);
        let (result, cache) = checker.check(URL, Some(before.clone())).await;

        assert_eq!(result.status(), Status::Redirection);
        assert_eq!(
            result.headers,
            vec![(
                "Location".to_string(),
                "https://example.test/moved".to_string()
            )]
        );
        assert_eq!(cache, Some(before));
    }

    #[tokio::test]
    async fn byte_level_change_counts_even_without_line_diffs() {
        // Both bodies decode lossily to the replacement character, so the
        // line diff is empty while the bytes clearly differ
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_, _| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: vec![0xFE],
                })
            })
        });

        let checker = Checker::new(Arc::new(mock));
        let before = RevalidationCache {
            body: vec![0xFF],
            etag: None,
        };
        let (result, cache) = checker.check(URL, Some(before)).await;

        assert_eq!(result.status(), Status::Success { changed: true });
        let diff = result.diff.unwrap();
        assert!(diff.changes.is_empty());
        assert_eq!(cache.unwrap().body, vec![0xFE]);
    }

    #[tokio::test]
    async fn probe_reports_unreachable_hosts_as_transfer_errors() {
        let result = probe("http://127.0.0.1:1/test").await.unwrap();
        assert_eq!(result.status(), Status::TransferError);
    }
}
