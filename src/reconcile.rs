//! Field reconciliation.
//!
//! Every release field that can live in more than one place is derived from
//! an ordered table of sources. Each source is a pure function returning an
//! optional value and the first present value wins, so the fallback order is
//! the table itself.

use log::debug;
use scraper::Html;
use serde_json::Value;

use crate::art;
use crate::classify::classify;
use crate::locate::PageRecord;
use crate::models::{ReleaseRecord, TrackRecord};
use crate::text;

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// The two sides of a page every source may look at.
#[derive(Clone, Copy)]
pub struct PageView<'a> {
    pub document: &'a Html,
    pub record: &'a PageRecord,
}

pub type FieldSource<T> = (&'static str, fn(&PageView<'_>) -> Option<T>);

/// Returns the value of the first source that yields one.
pub fn first_present<T>(view: &PageView<'_>, field: &str, sources: &[FieldSource<T>]) -> Option<T> {
    sources.iter().find_map(|(name, source)| {
        let value = source(view)?;
        debug!("{} taken from {}", field, name);
        Some(value)
    })
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

// ============================================================================
// Source Tables
// ============================================================================

pub const DATE_SOURCES: [FieldSource<Value>; 3] = [
    ("album_release_date", |view| view.record.get("album_release_date").cloned()),
    ("current.release_date", |view| {
        view.record.nested(&["current", "release_date"]).cloned()
    }),
    ("embed_info.item_public", |view| {
        view.record.nested(&["embed_info", "item_public"]).cloned()
    }),
];

pub const TITLE_SOURCES: [FieldSource<String>; 3] = [
    ("current.title", |view| view.record.str(&["current", "title"]).and_then(non_empty)),
    ("first track title", |view| {
        view.record
            .trackinfo()
            .first()
            .and_then(|track| track.get("title"))
            .and_then(Value::as_str)
            .and_then(non_empty)
    }),
    ("ld+json name", |view| {
        view.record
            .ld_json()
            .and_then(|ld| ld.get("name"))
            .and_then(Value::as_str)
            .and_then(non_empty)
    }),
];

pub const LABEL_SOURCES: [FieldSource<String>; 2] = [
    ("label link", |view| text::label_link_text(view.document)),
    ("item sellers", seller_name),
];

fn seller_name(view: &PageView<'_>) -> Option<String> {
    let band_id = match view.record.get("band_id")? {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    };
    view.record
        .nested(&["item_sellers", band_id.as_str(), "name"])
        .and_then(Value::as_str)
        .and_then(non_empty)
}

// ============================================================================
// Release Fields
// ============================================================================

pub fn date_published(view: &PageView<'_>) -> Option<Value> {
    first_present(view, "datePublished", &DATE_SOURCES)
}

pub fn title(view: &PageView<'_>) -> String {
    first_present(view, "title", &TITLE_SOURCES).unwrap_or_else(|| UNTITLED.to_string())
}

pub fn label(view: &PageView<'_>) -> Option<String> {
    first_present(view, "label", &LABEL_SOURCES)
}

pub fn artist(view: &PageView<'_>) -> String {
    view.record
        .str(&["artist"])
        .and_then(non_empty)
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
}

/// `keywords` as a list; a comma-separated string is split.
pub fn tags(view: &PageView<'_>) -> Vec<String> {
    match view.record.get("keywords") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(non_empty)
            .collect(),
        Some(Value::String(joined)) => joined.split(',').filter_map(non_empty).collect(),
        _ => Vec::new(),
    }
}

/// Release-level values the track normalizer inherits.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseContext {
    pub artist: String,
    pub label: Option<String>,
    /// Full art URL (with extension) or the sentinel
    pub art_url: String,
}

impl ReleaseContext {
    pub fn from_view(view: &PageView<'_>) -> Self {
        Self {
            artist: artist(view),
            label: label(view),
            art_url: art::art_url(view.document),
        }
    }
}

/// Assembles the release record once its tracks are known.
pub fn build_release(
    url: &str,
    view: &PageView<'_>,
    context: ReleaseContext,
    trackinfo: Vec<TrackRecord>,
) -> ReleaseRecord {
    ReleaseRecord {
        url: url.to_string(),
        title: title(view),
        artist: context.artist,
        label: context.label,
        classification: classify(view.document, view.record),
        tags: tags(view),
        item_id: view.record.nested(&["current", "id"]).cloned(),
        art_id: view.record.get("art_id").cloned(),
        is_preorder: view.record.get("is_preorder").and_then(Value::as_bool),
        date_published: date_published(view),
        about: text::about(view.document),
        credits: text::credits(view.document),
        license: text::license(view.document),
        cover_url_0: art::strip_jpg(&context.art_url),
        trackinfo,
    }
}
