//! The gateway every request is forwarded to

use crate::errors::ProxyError;
use axum::http::Uri;
use bon::Builder;
use url::Url;

/// The upstream base URL. Request paths are resolved relative to it, so a base of
/// `https://gateway/api` and a request for `/v1/models` forwards to `https://gateway/api/v1/models`.
#[derive(Debug, Clone, Builder)]
pub struct Upstream {
    pub url: Url,
}

impl Upstream {
    /// Resolve a request path (with optional query) against the base URL.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, ProxyError> {
        let mut base = self.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let joined = base
            .join(path_and_query.trim_start_matches('/'))
            .map_err(|e| ProxyError::InvalidUri(format!("{path_and_query}: {e}")))?;

        Uri::try_from(joined.as_str()).map_err(|e| ProxyError::InvalidUri(format!("{joined}: {e}")))
    }

    /// The `host[:port]` value for the Host header.
    pub fn host_header(&self) -> Option<String> {
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}
