//! Track normalization.
//!
//! Maps raw `trackinfo` entries to [`TrackRecord`]s. Only entries with a
//! streamable file reference survive; their relative order is kept.

use log::{debug, warn};
use scraper::Html;
use serde_json::Value;
use url::Url;

use crate::art;
use crate::decode::ScriptDecoder;
use crate::fetch::PageSource;
use crate::locate;
use crate::models::{TrackPageDetails, TrackRecord};
use crate::reconcile::{self, PageView, ReleaseContext};
use crate::text;

pub const UNTITLED_TRACK: &str = "Untitled Track";
const MISSING_TRACK_NUM: &str = "N/A";
const STREAM_FORMAT: &str = "mp3-128";

/// Collaborators needed to fetch and read per-track pages.
#[derive(Clone, Copy)]
pub struct DeepFetch<'a> {
    pub source: &'a dyn PageSource,
    pub decoder: &'a dyn ScriptDecoder,
}

// ============================================================================
// Field Helpers
// ============================================================================

/// `MM:SS`, or `HH:MM:SS` from one hour on. Fractions are truncated.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if total >= 3600 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Drops a leading `"<artist> - "` from compilation-style titles.
pub fn strip_artist_prefix<'t>(title: &'t str, artist: &str) -> &'t str {
    title
        .strip_prefix(artist)
        .and_then(|rest| rest.strip_prefix(" - "))
        .unwrap_or(title)
}

/// Release URL without query or fragment, used to resolve track links.
pub fn release_base_url(url: &str) -> Option<Url> {
    let mut base = Url::parse(url).ok()?;
    base.set_query(None);
    base.set_fragment(None);
    Some(base)
}

pub fn has_stream(track: &Value) -> bool {
    match track.get("file") {
        None | Some(Value::Null) => false,
        Some(Value::Object(formats)) => !formats.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(_)) => true,
    }
}

fn stream_url(track: &Value) -> Option<String> {
    let url = track.get("file")?.get(STREAM_FORMAT)?.as_str()?;
    Some(if url.starts_with("//") { format!("https:{url}") } else { url.to_string() })
}

fn track_num(track: &Value) -> Option<String> {
    match track.get("track_num")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && n.is_f64() => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalizes one raw track without visiting its page.
pub fn normalize_track(
    raw: &Value,
    context: &ReleaseContext,
    base: Option<&Url>,
    document: &Html,
) -> TrackRecord {
    let raw_title = raw.get("title").and_then(Value::as_str).unwrap_or(UNTITLED_TRACK);
    let track_artist = raw.get("artist").and_then(Value::as_str);

    let (title, artist) = match track_artist {
        Some(artist) => (strip_artist_prefix(raw_title, artist), artist),
        None => (raw_title, context.artist.as_str()),
    };

    let num = track_num(raw);
    let lyrics = num.as_deref().and_then(|num| text::lyrics(document, num));

    let url = raw
        .get("title_link")
        .and_then(Value::as_str)
        .zip(base)
        .and_then(|(link, base)| base.join(link).ok())
        .map(String::from);

    TrackRecord {
        title: title.to_string(),
        duration: format_duration(raw.get("duration").and_then(Value::as_f64).unwrap_or(0.0)),
        lyrics,
        label: context.label.clone(),
        track_id: raw.get("id").filter(|id| !id.is_null()).cloned(),
        track_num: num.unwrap_or_else(|| MISSING_TRACK_NUM.to_string()),
        artist: artist.to_string(),
        url,
        mp3url: stream_url(raw),
        page: None,
    }
}

/// Reads a track's own page. Returns the overlay and a track-specific label.
fn read_track_page(
    html: &str,
    album_art: &str,
    decoder: &dyn ScriptDecoder,
) -> (TrackPageDetails, Option<String>) {
    let document = Html::parse_document(html);
    let record = locate::page_record(&document, decoder);
    let view = PageView { document: &document, record: &record };

    let specific_art = art::art_url(&document);
    let cover = if art::is_art_url(&specific_art) { specific_art } else { album_art.to_string() };

    let details = TrackPageDetails {
        track_cover_url_0: art::strip_jpg(&cover),
        art_id: record.get("art_id").cloned(),
        about: text::about(&document),
        credits: text::credits(&document),
        license: text::license(&document),
    };
    (details, reconcile::label(&view))
}

/// Overlays track-page data. Any failure keeps the release-level defaults.
pub fn enrich_track(track: &mut TrackRecord, album_art: &str, deep: DeepFetch<'_>) {
    let mut details = TrackPageDetails {
        track_cover_url_0: art::strip_jpg(album_art),
        ..Default::default()
    };

    match track.url.as_deref() {
        Some(url) => match deep.source.fetch_page(url) {
            Ok(html) => {
                let (page_details, label) = read_track_page(&html, album_art, deep.decoder);
                details = page_details;
                if label.is_some() {
                    track.label = label;
                }
            }
            Err(e) => warn!("Failed to fetch individual page for track '{}': {}", track.title, e),
        },
        None => debug!("Track '{}' has no page link", track.title),
    }

    track.page = Some(details);
}

/// Normalizes all streamable tracks of a release, in source order.
pub fn normalize_tracks(
    view: &PageView<'_>,
    context: &ReleaseContext,
    release_url: &str,
    deep: Option<DeepFetch<'_>>,
) -> Vec<TrackRecord> {
    let base = release_base_url(release_url);
    let raw_tracks = view.record.trackinfo();

    raw_tracks
        .iter()
        .enumerate()
        .filter(|(_, raw)| has_stream(raw))
        .map(|(i, raw)| {
            let mut track = normalize_track(raw, context, base.as_ref(), view.document);
            if let Some(deep) = deep {
                debug!("Processing track {}/{}: {}", i + 1, raw_tracks.len(), track.title);
                enrich_track(&mut track, &context.art_url, deep);
            }
            track
        })
        .collect()
}
