//! Rendering and transport encoding for network documents
//!
//! The forward path is `render → gzip → base64`, each step after the first
//! optional:
//!
//! - `render` - indented GraphML text
//! - `gzip` - bare gzip stream, no custom header
//! - `base64` - standard alphabet, for embedding in text
//!
//! The inverse path (`decode`) undoes base64 when asked, gunzips whenever
//! the gzip magic is present, and parses the text.
//!
//! Writes to files never leave a truncated artifact behind: the payload is
//! built in memory first, and a failed write removes the partial file.

mod handoff;
mod xml;

pub use handoff::{HandoffTemplate, MARKER};
pub use xml::{parse, render, INDENT};

use crate::graph::{Document, UnknownValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// First two bytes of every gzip stream
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// File extensions that imply gzip compression on write
pub const COMPRESSED_EXTENSIONS: &[&str] = &["gz", "gzip"];

/// Errors producing the textual or encoded form of a document
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("XML serialization failed: {0}")]
    Xml(String),

    #[error("rendered document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("gzip compression failed: {0}")]
    Compress(#[source] io::Error),

    #[error("template has no '{0}' marker line")]
    MissingMarker(String),
}

/// Errors persisting an encoded document
#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output stream: {0}")]
    Stream(#[source] io::Error),
}

/// Errors turning bytes back into a document
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("gzip decompression failed: {0}")]
    Decompress(#[source] io::Error),

    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("XML error {0}")]
    Xml(String),

    #[error("document has no <graph> element")]
    MissingGraph,

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error(transparent)]
    Invalid(#[from] UnknownValue),
}

/// Which transport steps follow rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub gzip: bool,
    pub base64: bool,
}

impl EncodeOptions {
    /// Plain text
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn gzip() -> Self {
        Self {
            gzip: true,
            base64: false,
        }
    }

    /// gzip then base64, the form embedded in hand-off pages
    pub fn transport() -> Self {
        Self {
            gzip: true,
            base64: true,
        }
    }

    /// Force gzip when the destination name carries a compressed extension
    pub fn for_path(self, path: &Path) -> Self {
        Self {
            gzip: self.gzip || has_compressed_extension(path),
            ..self
        }
    }
}

/// Which inverse steps precede parsing (gzip is detected, not configured)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub base64: bool,
}

pub fn has_compressed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            COMPRESSED_EXTENSIONS
                .iter()
                .any(|c| c.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Apply the transport steps to already rendered text
pub fn encode_text(text: &str, opts: EncodeOptions) -> Result<Vec<u8>, RenderError> {
    let mut bytes = text.as_bytes().to_vec();
    if opts.gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).map_err(RenderError::Compress)?;
        bytes = encoder.finish().map_err(RenderError::Compress)?;
    }
    if opts.base64 {
        bytes = STANDARD.encode(&bytes).into_bytes();
    }
    Ok(bytes)
}

/// Render a document and apply the transport steps
pub fn encode(doc: &Document, opts: EncodeOptions) -> Result<Vec<u8>, RenderError> {
    let text = render(doc)?;
    encode_text(&text, opts)
}

/// Decompress `bytes` if they carry the gzip magic, otherwise pass them through
pub fn gunzip_if_compressed(bytes: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    if !is_gzip(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut out = Vec::with_capacity(bytes.len() * 4);
    MultiGzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(DecodeError::Decompress)?;
    Ok(Cow::Owned(out))
}

/// Decode base64 text, ignoring line breaks and other ASCII whitespace
pub fn decode_base64(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let compact: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

/// Inverse of [`encode`]: optional base64, transparent gunzip, parse
pub fn decode(bytes: &[u8], opts: DecodeOptions) -> Result<Document, DecodeError> {
    let raw = if opts.base64 {
        Cow::Owned(decode_base64(bytes)?)
    } else {
        Cow::Borrowed(bytes)
    };
    let plain = gunzip_if_compressed(&raw)?;
    let text = std::str::from_utf8(&plain)?;
    parse(text)
}

/// Write an encoded document to a stream, returning the number of bytes written
pub fn write_to<W: Write>(
    doc: &Document,
    mut out: W,
    opts: EncodeOptions,
) -> Result<usize, WriteError> {
    let payload = encode(doc, opts)?;
    out.write_all(&payload).map_err(WriteError::Stream)?;
    out.flush().map_err(WriteError::Stream)?;
    Ok(payload.len())
}

/// Write an encoded document to `path`.
///
/// A `.gz` name implies gzip. Nothing is created if rendering fails, and a
/// partially written file is removed.
pub fn write_file(doc: &Document, path: &Path, opts: EncodeOptions) -> Result<usize, WriteError> {
    let opts = opts.for_path(path);
    let payload = encode(doc, opts)?;
    persist(path, |out| out.write_all(&payload))?;
    info!(
        "Wrote {} nodes to {} ({} bytes, gzip={}, base64={})",
        doc.node_count(),
        path.display(),
        payload.len(),
        opts.gzip,
        opts.base64
    );
    Ok(payload.len())
}

/// Create `path`, run `write` against it and flush; remove the file on any failure
pub(crate) fn persist<F>(path: &Path, write: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    let result = write(&mut out)
        .and_then(|()| out.flush())
        .and_then(|()| out.get_ref().sync_all());
    drop(out);

    if let Err(source) = result {
        match std::fs::remove_file(path) {
            Ok(()) => warn!("Removed partial output {}", path.display()),
            Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
        }
        return Err(WriteError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
