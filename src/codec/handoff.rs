//! Hand-off pages: an HTML form carrying the encoded document to a viewer

use super::{encode, EncodeOptions, RenderError, WriteError};
use crate::graph::Document;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Line placeholder replaced by the encoded document
pub const MARKER: &str = "allthegraphmldatagoeshere";

const BUNDLED: &str = include_str!("post_stub.html");

/// A text template with one or more marker lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffTemplate {
    text: String,
}

impl Default for HandoffTemplate {
    fn default() -> Self {
        Self::bundled()
    }
}

impl HandoffTemplate {
    /// Use a custom template; it must contain at least one marker line
    pub fn new(text: impl Into<String>) -> Result<Self, RenderError> {
        let text = text.into();
        if !text.lines().any(|line| line.trim() == MARKER) {
            return Err(RenderError::MissingMarker(MARKER.to_string()));
        }
        Ok(Self { text })
    }

    /// The auto-submitting form shipped with the crate
    pub fn bundled() -> Self {
        Self {
            text: BUNDLED.to_string(),
        }
    }

    /// Substitute `payload` for every marker line
    pub fn fill(&self, payload: &str) -> String {
        let mut page = String::with_capacity(self.text.len() + payload.len());
        for line in self.text.lines() {
            if line.trim() == MARKER {
                page.push_str(payload);
            } else {
                page.push_str(line);
            }
            page.push('\n');
        }
        page
    }

    /// Page with the document inlined as base64(gzip(render))
    pub fn embed(&self, doc: &Document) -> Result<String, RenderError> {
        let payload = encode(doc, EncodeOptions::transport())?;
        // base64 output is pure ASCII
        let payload = String::from_utf8(payload)?;
        Ok(self.fill(&payload))
    }

    /// Write the page to a new `cbio*.html` temp file that outlives the process
    pub fn write_temp(&self, doc: &Document) -> Result<PathBuf, WriteError> {
        let page = self.embed(doc)?;

        let mut file = tempfile::Builder::new()
            .prefix("cbio")
            .suffix(".html")
            .tempfile()
            .map_err(|source| WriteError::Io {
                path: std::env::temp_dir(),
                source,
            })?;

        // NamedTempFile deletes itself on drop, so an early return cleans up
        let written = file
            .write_all(page.as_bytes())
            .and_then(|()| file.flush())
            .and_then(|()| file.as_file().sync_all());
        if let Err(source) = written {
            return Err(WriteError::Io {
                path: file.path().to_path_buf(),
                source,
            });
        }

        let (_, path) = file.keep().map_err(|e| WriteError::Io {
            path: e.file.path().to_path_buf(),
            source: e.error,
        })?;
        info!("Wrote hand-off page {}", path.display());
        Ok(path)
    }
}
