use std::time::Duration;

use crate::error::TransportError;

/// Report path asking for both instantaneous and cumulative registers.
pub const REPORT_PATH: &str = "/cgi-bin/egauge?inst&tot";

/// HTTP client for eGauge meters. One attempt per poll, no retries.
#[derive(Debug, Clone)]
pub struct EgaugeClient {
    client: reqwest::Client,
}

impl EgaugeClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetches the raw register report from `host`.
    pub async fn poll(&self, host: &str) -> Result<String, TransportError> {
        let url = request_url(host);
        tracing::debug!("eGauge request url: {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| transport_error(&url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { url, status });
        }

        response
            .text()
            .await
            .map_err(|source| transport_error(&url, source))
    }
}

/// Builds the report URL. Hosts given with a scheme are used as the base as-is.
pub fn request_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}{REPORT_PATH}")
    } else {
        format!("http://{host}{REPORT_PATH}")
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> TransportError {
    if source.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod test_egauge_client {
    use super::*;
    use mockito::Matcher;

    const REPORT: &str = r#"<data><r n="Grid"><v>100</v><i>42</i></r></data>"#;

    #[test]
    fn test_request_url() {
        assert_eq!(
            request_url("egauge1234.local"),
            "http://egauge1234.local/cgi-bin/egauge?inst&tot"
        );
        assert_eq!(
            request_url("10.0.0.5:8080"),
            "http://10.0.0.5:8080/cgi-bin/egauge?inst&tot"
        );
        assert_eq!(
            request_url("http://127.0.0.1:1234/"),
            "http://127.0.0.1:1234/cgi-bin/egauge?inst&tot"
        );
    }

    #[tokio::test]
    async fn test_poll_returns_body() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/cgi-bin/egauge")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(REPORT)
            .create_async()
            .await;

        let client = EgaugeClient::new(Duration::from_secs(5)).unwrap();
        let body = client.poll(&server.url()).await.unwrap();

        assert_eq!(body, REPORT);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_poll_non_success_status() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/cgi-bin/egauge")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = EgaugeClient::new(Duration::from_secs(5)).unwrap();
        let result = client.poll(&server.url()).await;

        match result {
            Err(TransportError::Status { status, .. }) => assert_eq!(status.as_u16(), 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_unreachable_host() {
        // Port 9 (discard) on localhost is not expected to be listening.
        let client = EgaugeClient::new(Duration::from_secs(2)).unwrap();
        let result = client.poll("127.0.0.1:9").await;
        tokio_test::assert_err!(result);
    }
}
