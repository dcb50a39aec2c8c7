//! Client URI grammar (§6): `protocol://host:port/path.ext?k1=v1&k2=v2`.
//!
//! Ported from `URLGrammar.hpp`'s `boost::spirit` grammar; `url` does the
//! character-level parsing here, this module just reshapes the result into
//! the fields the original grammar produced.

use url::Url;

use crate::error::ClientError;

/// A parsed client URI, split into the fields the client factory and
/// transport constructors need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUri {
    /// The scheme, e.g. `"ipbustcp-1.3"` — doubles as the client factory's
    /// registry key.
    pub protocol: String,
    /// Target hostname or IP literal.
    pub host: String,
    /// Target port, if given in the URI.
    pub port: Option<u16>,
    /// Path with any trailing extension stripped (e.g. address-map file
    /// path without `.xml`).
    pub path: String,
    /// The trailing extension, if present (e.g. `"xml"`).
    pub extension: String,
    /// Ordered `key=value` query arguments, duplicates preserved.
    pub arguments: Vec<(String, String)>,
}

impl ClientUri {
    /// Parse a client URI.
    ///
    /// # Errors
    ///
    /// `ClientError::MalformedUri` if the string isn't a valid URI, or
    /// lacks a host.
    pub fn parse(uri: &str) -> Result<Self, ClientError> {
        let parsed =
            Url::parse(uri).map_err(|e| ClientError::MalformedUri(uri.to_string(), e.to_string()))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| ClientError::MalformedUri(uri.to_string(), "missing host".to_string()))?
            .to_string();

        let raw_path = parsed.path().trim_start_matches('/');
        let (path, extension) = match raw_path.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.to_string()),
            None => (raw_path.to_string(), String::new()),
        };

        let arguments =
            parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

        Ok(Self {
            protocol: parsed.scheme().to_string(),
            host,
            port: parsed.port(),
            path,
            extension,
            arguments,
        })
    }
}
