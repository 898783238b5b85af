//! Notes and their posting scope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PosterError, Result};

/// Who can see a posted note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone and listed on public timelines
    #[default]
    Public,
    /// Visible to everyone but kept off public timelines
    Home,
    /// Visible to followers only
    Followers,
    /// Visible to explicitly mentioned users only
    Specified,
}

impl Visibility {
    /// The value sent to the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Home => "home",
            Visibility::Followers => "followers",
            Visibility::Specified => "specified",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = PosterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "home" => Ok(Visibility::Home),
            "followers" => Ok(Visibility::Followers),
            "specified" => Ok(Visibility::Specified),
            other => Err(PosterError::InvalidNote(format!(
                "unknown visibility '{}'",
                other
            ))),
        }
    }
}

/// A note to be posted.
///
/// Immutable once constructed; the text is guaranteed to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    text: String,
    visibility: Visibility,
}

impl Note {
    /// Create a note, rejecting empty text.
    pub fn new(text: impl Into<String>, visibility: Visibility) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(PosterError::InvalidNote("note text is empty".to_string()));
        }
        Ok(Self { text, visibility })
    }

    /// The note body.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}
