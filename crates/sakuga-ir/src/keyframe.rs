use serde::{Deserialize, Serialize};

/// An opaque, comparable token for one piece of authored content.
///
/// The source document decides what identity means (Krita hands back a hash
/// of the keyframe's pixel data); the pipeline only ever compares tokens for
/// equality. No hashing scheme is assumed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef(pub String);

impl ContentRef {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single authored timing event on a source channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyframeEvent {
    /// Zero-based frame index of the event.
    pub frame: u32,
    /// The content this event exposes. `None` is a stop frame: a blank
    /// keyframe that ends the current hold, leaving following rows empty.
    pub content: Option<ContentRef>,
    /// True if this event declares its content identical to an earlier
    /// event rather than introducing new content.
    pub is_clone: bool,
}

impl KeyframeEvent {
    /// A keyframe exposing new or cloned content.
    pub fn drawing(frame: u32, content: ContentRef) -> Self {
        Self {
            frame,
            content: Some(content),
            is_clone: false,
        }
    }

    /// A clone of earlier content.
    pub fn clone_of(frame: u32, content: ContentRef) -> Self {
        Self {
            frame,
            content: Some(content),
            is_clone: true,
        }
    }

    /// A stop frame (blank keyframe).
    pub fn stop(frame: u32) -> Self {
        Self {
            frame,
            content: None,
            is_clone: false,
        }
    }
}
