//! reqwest-backed lookup transport and eviction gateway

use async_trait::async_trait;
use cachescope::{EvictionGateway, Item, Key, Lookup, LookupTransport, TransportError};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, Url};
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Response header carrying the server-side duration in milliseconds
pub const SERVER_TIME_HEADER: &str = "x-server-timems";

/// Talks to the lookup service over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    prefix: Vec<String>,
}

impl HttpBackend {
    /// Build a backend for the configured service
    ///
    /// # Arguments
    /// * `config` - Base URL, path prefix and timeout
    ///
    /// # Returns
    /// * `Result<HttpBackend>` - Backend, or an error for an unusable base URL
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let base = Url::parse(config.base_url.trim())
            .map_err(|err| Error::InvalidBaseUrl(format!("{}: {}", config.base_url, err)))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(config.base_url.clone()));
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base,
            prefix: config.prefix_segments(),
        })
    }

    /// Base URL with the prefix and `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(self.prefix.iter().map(String::as_str))
                .extend(segments);
        }
        url
    }

    async fn delete(&self, url: Url) -> std::result::Result<(), TransportError> {
        debug!(%url, "DELETE");
        let response = self.client.delete(url).send().await.map_err(transport_error)?;
        check_status(&response)
    }
}

fn check_status(response: &Response) -> std::result::Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status(status.as_u16()))
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else if err.is_timeout() {
        TransportError::Network(format!("request timed out: {}", err))
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl LookupTransport for HttpBackend {
    async fn get(&self, key: &Key) -> std::result::Result<Lookup, TransportError> {
        let url = self.url(&[key.as_str()]);
        debug!(%url, "GET");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        check_status(&response)?;

        let server_duration_hint = response
            .headers()
            .get(SERVER_TIME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(transport_error)?;
        let item: Item = serde_json::from_slice(&body)
            .map_err(|err| TransportError::Decode(err.to_string()))?;

        Ok(Lookup {
            item,
            server_duration_hint,
        })
    }
}

#[async_trait]
impl EvictionGateway for HttpBackend {
    async fn evict_one(&self, key: &Key) -> std::result::Result<(), TransportError> {
        self.delete(self.url(&["cache", key.as_str()])).await
    }

    async fn evict_all(&self) -> std::result::Result<(), TransportError> {
        self.delete(self.url(&["cache"])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachescope::{Classifier, Probe, Sequencer};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {}\r\n", status);
        for (name, value) in headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));
        out
    }

    fn item_response(server_ms: &str, id: &str) -> String {
        response(
            "200 OK",
            &[("Content-Type", "application/json"), ("X-Server-TimeMs", server_ms)],
            &format!(r#"{{"id": "{}", "name": "Item", "description": "d"}}"#, id),
        )
    }

    /// Serve one canned response per connection, returning the request lines
    async fn serve(responses: Vec<String>) -> (HttpConfig, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut request_lines = Vec::new();
            for canned in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let head = String::from_utf8_lossy(&buf);
                request_lines.push(head.lines().next().unwrap_or_default().to_string());
                stream.write_all(canned.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            request_lines
        });

        let config = HttpConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        (config, handle)
    }

    #[tokio::test]
    async fn test_get_reads_header_and_body() {
        let (config, server) = serve(vec![item_response("37", "1")]).await;
        let backend = HttpBackend::new(&config).unwrap();

        let lookup = backend.get(&Key::from("1")).await.unwrap();

        assert_eq!(lookup.item.id, "1");
        assert_eq!(lookup.server_duration_hint.as_deref(), Some("37"));
        assert_eq!(server.await.unwrap(), vec!["GET /api/items/1 HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_get_without_header() {
        let body = r#"{"id": 5, "name": "n", "description": "d"}"#;
        let (config, _server) = serve(vec![response("200 OK", &[], body)]).await;
        let backend = HttpBackend::new(&config).unwrap();

        let lookup = backend.get(&Key::from("5")).await.unwrap();
        assert_eq!(lookup.item.id, "5");
        assert_eq!(lookup.server_duration_hint, None);
    }

    #[tokio::test]
    async fn test_get_error_status() {
        let (config, _server) = serve(vec![response("404 Not Found", &[], "")]).await;
        let backend = HttpBackend::new(&config).unwrap();

        let err = backend.get(&Key::from("404")).await.unwrap_err();
        assert_eq!(err, TransportError::Status(404));
    }

    #[tokio::test]
    async fn test_get_bad_body() {
        let (config, _server) =
            serve(vec![response("200 OK", &[("X-Server-TimeMs", "3")], "not json")]).await;
        let backend = HttpBackend::new(&config).unwrap();

        let err = backend.get(&Key::from("1")).await.unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_key_is_percent_encoded() {
        let (config, server) = serve(vec![item_response("1", "a b")]).await;
        let backend = HttpBackend::new(&config).unwrap();

        backend.get(&Key::from("a b")).await.unwrap();
        assert_eq!(server.await.unwrap(), vec!["GET /api/items/a%20b HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_evictions() {
        let ok = response("204 No Content", &[], "");
        let (config, server) = serve(vec![ok.clone(), ok]).await;
        let backend = HttpBackend::new(&config).unwrap();

        backend.evict_one(&Key::from("7")).await.unwrap();
        backend.evict_all().await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            vec![
                "DELETE /api/items/cache/7 HTTP/1.1",
                "DELETE /api/items/cache HTTP/1.1"
            ]
        );
    }

    #[tokio::test]
    async fn test_eviction_error_status() {
        let (config, _server) = serve(vec![response("500 Internal Server Error", &[], "")]).await;
        let backend = HttpBackend::new(&config).unwrap();

        let err = backend.evict_all().await.unwrap_err();
        assert_eq!(err, TransportError::Status(500));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = HttpConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();

        let err = backend.get(&Key::from("1")).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = HttpConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpBackend::new(&config),
            Err(Error::InvalidBaseUrl(_))
        ));

        let mailto = HttpConfig {
            base_url: "mailto:ops@example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpBackend::new(&mailto),
            Err(Error::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_url_with_custom_prefix() {
        let config = HttpConfig {
            base_url: "http://cache.local:9000/".to_string(),
            api_prefix: "/v2/products".to_string(),
            ..Default::default()
        };
        let backend = HttpBackend::new(&config).unwrap();

        assert_eq!(
            backend.url(&["cache", "12"]).as_str(),
            "http://cache.local:9000/v2/products/cache/12"
        );
    }

    #[tokio::test]
    async fn test_probe_and_benchmark_over_http() {
        let (config, server) = serve(vec![
            response("204 No Content", &[], ""),
            item_response("120", "1"),
            item_response("10", "1"),
            item_response("8", "1"),
        ])
        .await;
        let backend = HttpBackend::new(&config).unwrap();
        let seq = Sequencer::new(backend.clone(), backend);

        let run = seq.run(&Key::from("1"), 2).await.unwrap();

        let server_ms: Vec<u64> = run.points().iter().map(|p| p.server_ms).collect();
        assert_eq!(server_ms, vec![120, 10, 8]);
        assert_eq!(run.classify(&Classifier::default()), vec![false, true, true]);
        assert_eq!(
            server.await.unwrap(),
            vec![
                "DELETE /api/items/cache/1 HTTP/1.1",
                "GET /api/items/1 HTTP/1.1",
                "GET /api/items/1 HTTP/1.1",
                "GET /api/items/1 HTTP/1.1"
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_measures_client_time() {
        let (config, _server) = serve(vec![item_response("4", "2")]).await;
        let probe = Probe::new(HttpBackend::new(&config).unwrap());

        let m = probe.probe(&Key::from("2")).await.unwrap();
        assert_eq!(m.server_ms, 4);
        assert_eq!(m.item.id, "2");
    }
}
