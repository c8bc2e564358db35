//! Asset identity and the numbered locator convention.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The media kinds a gallery can show; each has its own grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Photos,
    Videos,
}

impl MediaKind {
    pub const ALL: [Self; 2] = [Self::Photos, Self::Videos];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photos => "photos",
            Self::Videos => "videos",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{base}/{prefix}{index}.{extension}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocatorPattern {
    /// Directory or URL prefix holding the numbered assets.
    pub base: String,
    pub prefix: String,
    pub extension: String,
}

impl LocatorPattern {
    pub fn new(
        base: impl Into<String>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Locator of the asset numbered `index` (no leading zeros).
    pub fn locate(&self, index: u32) -> String {
        let base = self.base.trim_end_matches('/');
        if base.is_empty() {
            format!("{}{}.{}", self.prefix, index, self.extension)
        } else {
            format!("{}/{}{}.{}", base, self.prefix, index, self.extension)
        }
    }

    /// Whether the base points at an HTTP(S) server rather than a local directory.
    pub fn is_remote(&self) -> bool {
        self.base.starts_with("http://") || self.base.starts_with("https://")
    }
}

impl fmt::Display for LocatorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base.trim_end_matches('/');
        if base.is_empty() {
            write!(f, "{}{{n}}.{}", self.prefix, self.extension)
        } else {
            write!(f, "{}/{}{{n}}.{}", base, self.prefix, self.extension)
        }
    }
}

/// A discovered asset. Identity is `(kind, index)`; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub kind: MediaKind,
    pub index: u32,
    pub locator: String,
}

impl Asset {
    pub fn new(kind: MediaKind, index: u32, pattern: &LocatorPattern) -> Self {
        Self {
            kind,
            index,
            locator: pattern.locate(index),
        }
    }
}

/// Natural pixel dimensions as reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `height / width`, or `None` for degenerate sizes.
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.height as f32 / self.width as f32)
    }

    pub const fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_trims_trailing_slash() {
        let pattern = LocatorPattern::new("assets/img/", "foto", "jpg");
        assert_eq!(pattern.locate(7), "assets/img/foto7.jpg");
        assert_eq!(pattern.to_string(), "assets/img/foto{n}.jpg");
    }

    #[test]
    fn remote_bases_are_detected() {
        assert!(LocatorPattern::new("https://example.org/v", "video", "mp4").is_remote());
        assert!(!LocatorPattern::new("/srv/v", "video", "mp4").is_remote());
    }

    #[test]
    fn degenerate_dimensions_have_no_ratio() {
        assert_eq!(Dimensions::new(0, 10).aspect_ratio(), None);
        assert_eq!(Dimensions::new(200, 300).aspect_ratio(), Some(1.5));
    }
}
