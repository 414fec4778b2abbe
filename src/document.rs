//! Immutable documents flowing through pipelines.
//!
//! A [`Document`] is a source path (optional), a content body, and a
//! [`Metadata`] layer. Documents are never mutated: modules derive new ones
//! with [`Document::clone_with`], which shares the parent's content when no
//! replacement is given and stacks an overlay layer on the parent's
//! metadata. Cloning a `Document` value is a reference-count bump.
//!
//! Content is never null. A document created without content carries empty
//! text.

use crate::io::FilePath;
use crate::metadata::{ConversionError, Metadata, Value};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::{Arc, OnceLock};

/// Document body: UTF-8 text or raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum Content {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(Arc::from(""))
    }
}

impl Content {
    /// Bytes that are valid UTF-8 become text; anything else stays binary.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Content::Text(text.into()),
            Err(e) => Content::Binary(e.into_bytes().into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    /// Text view. Binary content is decoded lossily.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Content::Text(text) => Cow::Borrowed(text),
            Content::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Content::Binary(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh reader over the content. Each call starts from the beginning.
    pub fn reader(&self) -> impl Read + Send + 'static {
        let bytes: Arc<[u8]> = match self {
            Content::Text(text) => Arc::from(text.as_bytes()),
            Content::Binary(bytes) => Arc::clone(bytes),
        };
        Cursor::new(bytes)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Content::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text.into())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.into())
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Binary(bytes.into())
    }
}

/// Stable identity of a document for cache keys: its source plus a content
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity {
    pub source: Option<FilePath>,
    pub fingerprint: String,
}

struct Inner {
    source: Option<FilePath>,
    content: Content,
    metadata: Metadata,
    fingerprint: OnceLock<String>,
}

#[derive(Clone)]
pub struct Document {
    inner: Arc<Inner>,
}

impl Document {
    pub fn new(source: Option<FilePath>, content: impl Into<Content>, metadata: Metadata) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                content: content.into(),
                metadata,
                fingerprint: OnceLock::new(),
            }),
        }
    }

    /// An empty document with no source over `metadata`.
    pub fn empty(metadata: Metadata) -> Self {
        Self::new(None, Content::default(), metadata)
    }

    pub fn source(&self) -> Option<&FilePath> {
        self.inner.source.as_ref()
    }

    pub fn content(&self) -> &Content {
        &self.inner.content
    }

    pub fn text(&self) -> Cow<'_, str> {
        self.inner.content.as_text()
    }

    pub fn bytes(&self) -> &[u8] {
        self.inner.content.as_bytes()
    }

    pub fn reader(&self) -> impl Read + Send + 'static {
        self.inner.content.reader()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    pub fn get<T>(&self, key: &str) -> Result<Option<T>, ConversionError>
    where
        T: DeserializeOwned + 'static,
    {
        self.inner.metadata.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.inner.metadata.get_value(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.inner.metadata.get_string(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.metadata.contains_key(key)
    }

    /// Derive a document. `content` replaces the body when given; `overlay`
    /// becomes a new metadata layer over this document's metadata. The
    /// source path is carried over.
    pub fn clone_with<K, V>(
        &self,
        content: Option<Content>,
        overlay: impl IntoIterator<Item = (K, V)>,
    ) -> Document
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let overlay: Vec<(String, Value)> = overlay
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let metadata = if overlay.is_empty() {
            self.inner.metadata.clone()
        } else {
            self.inner.metadata.child(overlay)
        };
        let same_content = content.is_none();
        let doc = Document::new(
            self.inner.source.clone(),
            content.unwrap_or_else(|| self.inner.content.clone()),
            metadata,
        );
        if same_content {
            if let Some(fp) = self.inner.fingerprint.get() {
                let _ = doc.inner.fingerprint.set(fp.clone());
            }
        }
        doc
    }

    pub fn with_content(&self, content: impl Into<Content>) -> Document {
        self.clone_with(Some(content.into()), Vec::<(String, Value)>::new())
    }

    pub fn with_metadata<K, V>(&self, overlay: impl IntoIterator<Item = (K, V)>) -> Document
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.clone_with(None, overlay)
    }

    /// Hex SHA-256 of the content, computed once.
    pub fn fingerprint(&self) -> &str {
        self.inner.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(self.inner.content.as_bytes());
            format!("{:x}", hasher.finalize())
        })
    }

    pub fn identity(&self) -> DocumentIdentity {
        DocumentIdentity {
            source: self.inner.source.clone(),
            fingerprint: self.fingerprint().to_string(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.inner.source.as_ref().map(FilePath::as_str))
            .field("content", &self.inner.content)
            .field("metadata", &self.inner.metadata)
            .finish()
    }
}
