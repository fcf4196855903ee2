use crate::constants::DEFAULT_USER_AGENT;
use crate::delivery::RetryPolicy;
use crate::error::{Result, ScraperError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Build the one `reqwest::Client` shared by every adapter and the delivery client.
pub fn build_client(user_agent: Option<&str>, timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("nl-NL,nl;q=0.9,en;q=0.8"));

    let client = reqwest::Client::builder()
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()?;
    Ok(client)
}

/// Source pages get three tries, 2s then 4s apart.
fn source_fetch_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(1), Duration::ZERO)
}

/// GET `url` and return the body, retrying with the source fetch policy.
pub async fn fetch_html(client: &reqwest::Client, source_name: &str, url: &str) -> Result<String> {
    fetch_html_with_retry(client, source_name, url, &source_fetch_policy()).await
}

/// GET `url` up to `policy.max_attempts` times. Any non-2xx status or transport
/// error counts as a failed attempt; the last error is a fetch failure for
/// `source_name`.
#[instrument(skip(client, policy))]
pub async fn fetch_html_with_retry(
    client: &reqwest::Client,
    source_name: &str,
    url: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    let max = policy.max_attempts;
    let mut attempt = 1;
    loop {
        match fetch_once(client, source_name, url).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt >= max => {
                error!("Failed to fetch {} after {} attempts: {}", url, max, e);
                return Err(e);
            }
            Err(e) => {
                let wait = policy.backoff_after(attempt);
                warn!("Retry {}/{} for {} in {:?}: {}", attempt, max, url, wait, e);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

async fn fetch_once(client: &reqwest::Client, source_name: &str, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ScraperError::fetch(source_name, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::fetch(
            source_name,
            format!("{} responded with status {}", url, status.as_u16()),
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ScraperError::fetch(source_name, e))?;
    debug!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn builds_with_default_and_custom_user_agent() {
        assert!(build_client(None, Duration::from_secs(10)).is_ok());
        assert!(build_client(Some("event_sync-test/1.0"), Duration::from_secs(10)).is_ok());
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(5), Duration::ZERO)
    }

    /// Serves 503 for the first `failures` requests, then a page.
    fn flaky_agenda(failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/agenda",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < failures {
                        (StatusCode::SERVICE_UNAVAILABLE, "busy")
                    } else {
                        (StatusCode::OK, "<html>agenda</html>")
                    }
                }
            }),
        );
        let server = hyper::Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(app.into_make_service());
        let url = format!("http://{}/agenda", server.local_addr());
        tokio::spawn(server);
        (url, hits)
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let (url, hits) = flaky_agenda(2);
        let client = build_client(None, Duration::from_secs(5)).unwrap();

        let body = fetch_html_with_retry(&client, "agenda", &url, &quick_retry()).await.unwrap();
        assert_eq!(body, "<html>agenda</html>");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget() {
        let (url, hits) = flaky_agenda(usize::MAX);
        let client = build_client(None, Duration::from_secs(5)).unwrap();

        let err = fetch_html_with_retry(&client, "agenda", &url, &quick_retry())
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Fetch { ref message, .. } if message.contains("503")));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let client = build_client(None, Duration::from_secs(2)).unwrap();
        let err = fetch_html_with_retry(&client, "nowhere", "http://127.0.0.1:9/agenda", &quick_retry())
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Fetch { ref source_name, .. } if source_name == "nowhere"));
    }
}
