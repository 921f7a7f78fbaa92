//! Document loading from local files and the remote network service
//!
//! Every source goes through the same path: read bytes, gunzip when the
//! gzip magic is present, parse. Failures are reported once with
//! `tracing::error!` and never yield a partial document.

mod fetch;

pub use fetch::{query_url, NetworkFetcher};

use crate::codec::{self, DecodeError, DecodeOptions};
use crate::config::FetchConfig;
use crate::graph::Document;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that can occur while loading a document
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed document at {location}: {source}")]
    Malformed {
        location: String,
        #[source]
        source: DecodeError,
    },
}

impl LoadError {
    pub(crate) fn io(location: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            location: location.into(),
            source,
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Where a document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    /// `http://` and `https://` locations are URLs, anything else a path
    pub fn parse(location: &str) -> Self {
        let lower = location.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Url(location.trim().to_string())
        } else {
            Source::Path(PathBuf::from(location))
        }
    }
}

impl From<&str> for Source {
    fn from(location: &str) -> Self {
        Source::parse(location)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => f.write_str(url),
        }
    }
}

/// Loads documents, fetching URLs with the configured network settings
#[derive(Debug, Clone, Default)]
pub struct Loader {
    fetch: FetchConfig,
}

impl Loader {
    pub fn new(fetch: &FetchConfig) -> Self {
        Self {
            fetch: fetch.clone(),
        }
    }

    pub fn load(&self, source: &Source) -> LoadResult<Document> {
        let result = match source {
            Source::Path(path) => read_file(path),
            Source::Url(url) => NetworkFetcher::new(&self.fetch).get(url),
        };
        logged(source, result)
    }
}

/// Load a document from a path or URL with default network settings
pub fn load(source: &Source) -> LoadResult<Document> {
    Loader::default().load(source)
}

/// Load a document from a local file, gzipped or plain
pub fn load_file(path: &Path) -> LoadResult<Document> {
    logged(&Source::from(path), read_file(path))
}

/// Decode an in-memory payload
pub fn load_bytes(bytes: &[u8]) -> LoadResult<Document> {
    logged("<memory>", decode_bytes(bytes, "<memory>"))
}

/// Drain a reader and decode its contents
pub fn load_from_reader<R: Read>(mut reader: R) -> LoadResult<Document> {
    let mut bytes = Vec::new();
    let result = reader
        .read_to_end(&mut bytes)
        .map_err(|e| LoadError::io("<reader>", e))
        .and_then(|_| decode_bytes(&bytes, "<reader>"));
    logged("<reader>", result)
}

fn read_file(path: &Path) -> LoadResult<Document> {
    let location = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(location.clone()),
        _ => LoadError::io(location.clone(), e),
    })?;

    let has_gz_name = codec::has_compressed_extension(path);
    if has_gz_name && !codec::is_gzip(&bytes) {
        debug!("{} has a gzip name but no gzip magic, reading as text", location);
    }
    decode_bytes(&bytes, &location)
}

pub(crate) fn decode_bytes(bytes: &[u8], location: &str) -> LoadResult<Document> {
    codec::decode(bytes, DecodeOptions::default()).map_err(|source| LoadError::Malformed {
        location: location.to_string(),
        source,
    })
}

fn logged(source: impl fmt::Display, result: LoadResult<Document>) -> LoadResult<Document> {
    match &result {
        Ok(doc) => info!(
            "Loaded {} nodes and {} edges from {}",
            doc.node_count(),
            doc.graph.edges.len(),
            source
        ),
        Err(e) => error!("Could not load network: {}", e),
    }
    result
}
