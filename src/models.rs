//! Core data models for release extraction.
//!
//! This module contains the output records produced by the extraction
//! pipeline and the small enums shared between stages.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// Top-level output container: artist display name -> releases found for it.
/// Always holds exactly one key per run.
pub type ArtistBundle = BTreeMap<String, Vec<ReleaseRecord>>;

// ============================================================================
// Classification
// ============================================================================

/// Pricing classification of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Paid,
    Free,
    /// Name your price
    Nyp,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Paid => "paid",
            Classification::Free => "free",
            Classification::Nyp => "nyp",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Output Models
// ============================================================================

/// One release (album or single track page) as written to disk.
///
/// Built once per page fetch and never mutated after it has been appended
/// to an [`ArtistBundle`]. `title` is always non-empty.
#[derive(Clone, Debug, Serialize)]
pub struct ReleaseRecord {
    pub url: String,
    pub title: String,
    pub artist: String,
    pub label: Option<String>,
    pub classification: Classification,
    pub tags: Vec<String>,
    pub item_id: Option<Value>,
    pub art_id: Option<Value>,
    pub is_preorder: Option<bool>,
    /// Passed through as found on the page, format is not validated.
    #[serde(rename = "datePublished")]
    pub date_published: Option<Value>,
    pub about: Option<String>,
    pub credits: Option<String>,
    pub license: Option<String>,
    /// Highest-resolution art URL with a trailing `.jpg` stripped, or the
    /// "not found" sentinel.
    #[serde(rename = "coverUrl_0")]
    pub cover_url_0: String,
    pub trackinfo: Vec<TrackRecord>,
}

impl ReleaseRecord {
    pub fn is_preorder(&self) -> bool {
        self.is_preorder == Some(true)
    }
}

/// One streamable track of a release.
#[derive(Clone, Debug, Serialize)]
pub struct TrackRecord {
    pub title: String,
    /// `MM:SS`, or `HH:MM:SS` from one hour on.
    pub duration: String,
    pub lyrics: Option<String>,
    pub label: Option<String>,
    pub track_id: Option<Value>,
    pub track_num: String,
    pub artist: String,
    pub url: Option<String>,
    pub mp3url: Option<String>,
    /// Present only when per-track pages were fetched.
    #[serde(flatten)]
    pub page: Option<TrackPageDetails>,
}

/// Fields overlaid from a track's own page.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackPageDetails {
    #[serde(rename = "trackCoverUrl_0")]
    pub track_cover_url_0: String,
    pub art_id: Option<Value>,
    pub about: Option<String>,
    pub credits: Option<String>,
    pub license: Option<String>,
}

// ============================================================================
// URL List Exclusions
// ============================================================================

/// Why a release was left out of the saved URL list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExclusionReason {
    Preorder,
    NoStreamableTracks,
}

impl ExclusionReason {
    /// Returns the reason a release must be excluded, if any.
    /// Preorder takes precedence.
    pub fn for_release(release: &ReleaseRecord) -> Option<Self> {
        if release.is_preorder() {
            Some(ExclusionReason::Preorder)
        } else if release.trackinfo.is_empty() {
            Some(ExclusionReason::NoStreamableTracks)
        } else {
            None
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Preorder => f.write_str("release is a preorder"),
            ExclusionReason::NoStreamableTracks => {
                f.write_str("release has no streamable tracks")
            }
        }
    }
}
