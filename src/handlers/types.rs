use bytes::Bytes;
use std::io::Cursor;

/// Payload of a sub-unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Bytes),
}

/// One readable unit yielded by a file handler; consumed by exactly one
/// transformation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubUnit {
    /// Archive member name, when the unit came out of a container
    pub name: Option<String>,
    pub content: Content,
}

impl SubUnit {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content: Content::Text(content.into()),
        }
    }

    pub fn binary(content: impl Into<Bytes>) -> Self {
        Self {
            name: None,
            content: Content::Binary(content.into()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.content, Content::Binary(_))
    }

    /// Decoded text, or `None` for binary units
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::Binary(_) => None,
        }
    }

    /// Raw bytes of the unit (UTF-8 for text units)
    pub fn as_bytes(&self) -> &[u8] {
        match &self.content {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    /// Readable view over the unit's bytes
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.as_bytes())
    }
}
