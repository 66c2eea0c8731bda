//! Fetching wires: the request seam the runtime downloads through, the
//! default reqwest-backed implementation, and JSON row decoding.

use std::collections::BTreeMap;

/// One URL to fetch, with the hints of the download it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    pub url: String,
    /// The page needs a JavaScript-capable fetcher.
    pub js: bool,
    pub threads: Option<usize>,
}

impl Wire {
    pub fn new(url: impl Into<String>) -> Self {
        Wire {
            url: url.into(),
            js: false,
            threads: None,
        }
    }
}

/// Failure of a single wire. Never escapes a worker; it is recorded in the
/// wire's slot and raised when the consumer reaches that row.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server answered with status {0}")]
    Status(u16),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("worker panicked while fetching")]
    Panicked,

    #[error("row was already consumed")]
    Consumed,
}

/// A prepared fetch of one wire.
pub trait HttpRequest: Send {
    fn download(&self) -> Result<Vec<u8>, DownloadError>;
}

/// Builds requests for wires. Hosts supply their own to mock the network
/// or to render JavaScript.
pub trait RequestFactory: Send + Sync {
    fn create(&self, wire: &Wire) -> Box<dyn HttpRequest>;
}

/// One object of a JSON response, keyed by property name.
pub type DynamicObject = BTreeMap<String, String>;

/// Decodes a JSON body into rows.
///
/// An array gives one row per element, an object gives one row, anything
/// else gives none. String properties keep their text; other values are
/// rendered as JSON.
pub fn json_rows(body: &[u8]) -> Result<Vec<DynamicObject>, DownloadError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let rows = match value {
        serde_json::Value::Array(items) => items.iter().map(object_row).collect(),
        serde_json::Value::Object(_) => vec![object_row(&value)],
        _ => Vec::new(),
    };
    Ok(rows)
}

fn object_row(value: &serde_json::Value) -> DynamicObject {
    let mut row = DynamicObject::new();
    match value {
        serde_json::Value::Object(map) => {
            for (key, field) in map {
                let text = match field {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                row.insert(key.clone(), text);
            }
        }
        other => {
            row.insert("value".to_string(), other.to_string());
        }
    }
    row
}

#[cfg(feature = "http")]
pub use self::reqwest_impl::HttpRequestFactory;

#[cfg(feature = "http")]
mod reqwest_impl {
    use reqwest::blocking::Client;
    use reqwest::redirect::Policy;

    use super::{DownloadError, HttpRequest, RequestFactory, Wire};
    use crate::config::RuntimeConfig;

    /// Plain HTTP fetcher. Wires asking for JavaScript are fetched raw.
    #[derive(Debug, Clone)]
    pub struct HttpRequestFactory {
        client: Client,
    }

    impl HttpRequestFactory {
        pub fn new(config: &RuntimeConfig) -> Result<Self, DownloadError> {
            let client = Client::builder()
                .user_agent(config.user_agent.clone())
                .timeout(config.timeout)
                .redirect(Policy::limited(10))
                .build()?;
            Ok(HttpRequestFactory { client })
        }
    }

    impl RequestFactory for HttpRequestFactory {
        fn create(&self, wire: &Wire) -> Box<dyn HttpRequest> {
            if wire.js {
                tracing::debug!(url = %wire.url, "no script rendering available, fetching raw");
            }
            Box::new(ReqwestRequest {
                client: self.client.clone(),
                url: wire.url.clone(),
            })
        }
    }

    struct ReqwestRequest {
        client: Client,
        url: String,
    }

    impl HttpRequest for ReqwestRequest {
        fn download(&self) -> Result<Vec<u8>, DownloadError> {
            let response = self.client.get(&self.url).send()?;
            let status = response.status();
            if !status.is_success() {
                return Err(DownloadError::Status(status.as_u16()));
            }
            Ok(response.bytes()?.to_vec())
        }
    }
}
