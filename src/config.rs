use std::path::Path;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::asset::{LocatorPattern, MediaKind};
use crate::processing::layout::LayoutParams;

/// Where one media kind lives and how its placeholders look.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaSource {
    #[serde(flatten)]
    pub pattern: LocatorPattern,
    /// Highest index probed during discovery.
    pub max_index: u32,
    /// `height / width` used until the real dimensions are known.
    #[serde(default = "MediaSource::default_placeholder_aspect_ratio")]
    pub placeholder_aspect_ratio: f32,
}

impl MediaSource {
    const fn default_placeholder_aspect_ratio() -> f32 {
        1.0
    }

    pub fn default_photos() -> Self {
        Self {
            pattern: LocatorPattern::new("assets/img", "foto", "jpg"),
            max_index: 150,
            placeholder_aspect_ratio: 1.0,
        }
    }

    pub fn default_videos() -> Self {
        Self {
            pattern: LocatorPattern::new("assets/videos", "video", "mp4"),
            max_index: 14,
            placeholder_aspect_ratio: 0.75,
        }
    }

    fn validate(&self, kind: MediaKind) -> Result<()> {
        ensure!(self.max_index >= 1, "{kind}.max-index must be at least 1");
        ensure!(
            self.placeholder_aspect_ratio.is_finite() && self.placeholder_aspect_ratio > 0.0,
            "{kind}.placeholder-aspect-ratio must be positive"
        );
        ensure!(!self.pattern.extension.is_empty(), "{kind}.extension must not be empty");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscoveryOptions {
    /// Maximum number of outstanding existence probes.
    pub concurrency: usize,
    /// Stop early if none of the first N indices exist. 0 disables the shortcut.
    pub early_exit_window: u32,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            early_exit_window: 10,
            probe_timeout: Duration::from_millis(800),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolutionOptions {
    /// Items resolved concurrently before the grid is re-laid out.
    pub batch_size: usize,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            batch_size: 3,
            probe_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub photos: MediaSource,
    pub videos: MediaSource,
    pub layout: LayoutParams,
    pub discovery: DiscoveryOptions,
    pub resolution: ResolutionOptions,
    /// Quiet period after the last resize before the grid is re-laid out.
    #[serde(with = "humantime_serde")]
    pub resize_debounce: Duration,
    /// Fraction of a tile that must be on screen for it to count as visible.
    pub visibility_threshold: f32,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    pub fn source(&self, kind: MediaKind) -> &MediaSource {
        match kind {
            MediaKind::Photos => &self.photos,
            MediaKind::Videos => &self.videos,
        }
    }

    pub fn source_mut(&mut self, kind: MediaKind) -> &mut MediaSource {
        match kind {
            MediaKind::Photos => &mut self.photos,
            MediaKind::Videos => &mut self.videos,
        }
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        for kind in MediaKind::ALL {
            self.source(kind).validate(kind)?;
        }
        ensure!(
            self.layout.column_width > 0.0,
            "layout.column-width must be positive"
        );
        ensure!(self.layout.gap >= 0.0, "layout.gap must not be negative");
        ensure!(
            self.layout.caption_padding >= 0.0 && self.layout.outer_margin >= 0.0,
            "layout paddings must not be negative"
        );
        ensure!(
            self.discovery.concurrency > 0,
            "discovery.concurrency must be greater than zero"
        );
        ensure!(
            self.resolution.batch_size > 0,
            "resolution.batch-size must be greater than zero"
        );
        ensure!(
            !self.discovery.probe_timeout.is_zero() && !self.resolution.probe_timeout.is_zero(),
            "probe timeouts must be greater than zero"
        );
        ensure!(
            self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0,
            "visibility-threshold must be within (0, 1]"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photos: MediaSource::default_photos(),
            videos: MediaSource::default_videos(),
            layout: LayoutParams::default(),
            discovery: DiscoveryOptions::default(),
            resolution: ResolutionOptions::default(),
            resize_debounce: Duration::from_millis(250),
            visibility_threshold: 0.3,
        }
    }
}
