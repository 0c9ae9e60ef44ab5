//! Configuration types for ingestion and submission.
//!
//! All behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The config is constructed once at startup and
//! shared read-only (`Arc<ClientConfig>` in a [`crate::session::Session`]);
//! the [`AllowList`] inside it is what the validator consults.

use crate::error::DeckDropError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Endpoint used when none is configured: the conversion server's upload route.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/upload";

/// Filename used when the response carries no usable disposition header.
pub const DEFAULT_FILENAME: &str = "presentation.pptx";

/// Largest payload the conversion server accepts (its request size limit).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

/// Accepted media types and filename extensions.
///
/// A candidate passes if its declared media type is listed, or, when the
/// declared type is empty, if its lowercased name ends with one of the
/// extensions. Extensions are stored lowercase with the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
    types: BTreeSet<String>,
    extensions: BTreeSet<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(
            [
                "image/png",
                "image/jpeg",
                "image/gif",
                "image/bmp",
                "image/tiff",
                "application/pdf",
            ],
            [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tiff", ".pdf"],
        )
    }
}

impl AllowList {
    /// Build an allow-list. Extensions are normalised to lowercase and given
    /// a leading dot if they lack one; media types are kept verbatim.
    pub fn new<T, E>(types: T, extensions: E) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        Self {
            types: types.into_iter().map(Into::into).collect(),
            extensions,
        }
    }

    /// Exact-string match on the declared media type.
    pub fn allows_type(&self, declared_type: &str) -> bool {
        self.types.contains(declared_type)
    }

    /// Case-insensitive suffix match on the filename.
    pub fn allows_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

/// Configuration for a deckdrop client.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_deckdrop::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .endpoint("http://localhost:5000/upload")
///     .request_timeout_secs(120)
///     .output_dir("decks")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Conversion endpoint receiving the multipart `POST`. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Types and extensions admitted into the selection.
    pub allow_list: AllowList,

    /// Whole-request timeout in seconds. Default: 300.
    ///
    /// Conversion happens while the request is open, so large folders of
    /// PDFs need a generous value.
    pub request_timeout_secs: u64,

    /// Submissions whose total size exceeds this are refused before any
    /// bytes are sent. Default: 200 MiB.
    pub max_upload_bytes: u64,

    /// Directory the converted result is written to. Default: current directory.
    pub output_dir: PathBuf,

    /// Fallback name for the result. Default: [`DEFAULT_FILENAME`].
    pub default_filename: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            allow_list: AllowList::default(),
            request_timeout_secs: 300,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            output_dir: PathBuf::from("."),
            default_filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn allow_list(mut self, allow_list: AllowList) -> Self {
        self.config.allow_list = allow_list;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn default_filename(mut self, name: impl Into<String>) -> Self {
        self.config.default_filename = name.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, DeckDropError> {
        let c = &self.config;
        let parsed = reqwest::Url::parse(&c.endpoint).map_err(|e| {
            DeckDropError::InvalidConfig(format!("Endpoint '{}' is not a URL: {e}", c.endpoint))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DeckDropError::InvalidConfig(format!(
                "Endpoint must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(DeckDropError::InvalidConfig(
                "Maximum upload size must be > 0".into(),
            ));
        }
        if c.default_filename.trim().is_empty() {
            return Err(DeckDropError::InvalidConfig(
                "Default filename must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
