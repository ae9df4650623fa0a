//! Asset transport — turning a resource name into raw bytes.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching an asset's bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{location} returned an empty body")]
    Empty { location: String },
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of raw asset bytes, addressed by file name (e.g. `rain.wav`).
///
/// Implementations are shared across loader threads.
pub trait Fetch: Send + Sync {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, FetchError>;

    /// Human-readable location of `resource`, for logs and errors.
    fn locate(&self, resource: &str) -> String;
}

/// Fetches assets over HTTP relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::blocking::Client::new(), base_url)
    }

    /// Use a preconfigured client (proxies, timeouts).
    pub fn with_client(client: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.locate(resource);
        log::info!("fetching {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| FetchError::Request {
            url: url.clone(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(FetchError::Empty { location: url });
        }
        Ok(bytes.to_vec())
    }

    fn locate(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }
}

/// Reads assets from a local directory.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Fetch for DirFetcher {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(resource);
        log::info!("fetching {}", path.display());

        let bytes = std::fs::read(&path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(FetchError::Empty {
                location: path.display().to_string(),
            });
        }
        Ok(bytes)
    }

    fn locate(&self, resource: &str) -> String {
        self.root.join(resource).display().to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer every connection on a local port with `status` and `body`.
    /// Returns the base URL.
    pub(crate) fn serve(status: &str, body: &str) -> String {
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(&stream);
                let mut line = String::new();
                while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/clips")
    }

    /// Fetcher for a local server, bypassing any proxy in the environment.
    pub(crate) fn local_fetcher(base_url: String) -> HttpFetcher {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .unwrap();
        HttpFetcher::with_client(client, base_url)
    }

    #[test]
    fn http_fetch_returns_body() {
        let base = serve("200 OK", "RIFF");
        let fetcher = local_fetcher(base);
        assert_eq!(fetcher.fetch("rain.wav").unwrap(), b"RIFF");
    }

    #[test]
    fn http_error_status_is_reported() {
        let base = serve("404 Not Found", "");
        let fetcher = local_fetcher(base.clone());
        let err = fetcher.fetch("rain.wav").unwrap_err();
        match &err {
            FetchError::Status { url, status } => {
                assert_eq!(*status, 404);
                assert_eq!(url, &format!("{base}/rain.wav"));
            }
            other => panic!("expected status error, got {other}"),
        }
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn http_empty_body_is_rejected() {
        let base = serve("200 OK", "");
        let fetcher = local_fetcher(base);
        assert!(matches!(
            fetcher.fetch("rain.wav"),
            Err(FetchError::Empty { ref location }) if location.ends_with("/clips/rain.wav")
        ));
    }

    #[test]
    fn http_locate_joins_base() {
        let fetcher = HttpFetcher::new("https://example.com/sounds/");
        assert_eq!(
            fetcher.locate("rain3.wav"),
            "https://example.com/sounds/rain3.wav"
        );
    }

    #[test]
    fn dir_fetcher_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"RIFF").unwrap();
        let fetcher = DirFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("a.wav").unwrap(), b"RIFF");
    }

    #[test]
    fn dir_fetcher_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = DirFetcher::new(dir.path());
        let err = fetcher.fetch("missing.wav").unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn dir_fetcher_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.wav"), b"").unwrap();
        let fetcher = DirFetcher::new(dir.path());
        assert!(matches!(
            fetcher.fetch("empty.wav"),
            Err(FetchError::Empty { .. })
        ));
    }
}
