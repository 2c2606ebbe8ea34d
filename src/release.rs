//! Page-to-record pipeline for a single release page.

use log::{info, warn};
use scraper::Html;

use crate::decode::ScriptDecoder;
use crate::locate;
use crate::models::ReleaseRecord;
use crate::reconcile::{self, PageView, ReleaseContext};
use crate::tracks::{self, DeepFetch};

/// Builds the release record of an already fetched page. Never fails:
/// missing data degrades field by field.
pub fn parse_release_page(
    url: &str,
    html: &str,
    decoder: &dyn ScriptDecoder,
    deep: Option<DeepFetch<'_>>,
) -> ReleaseRecord {
    let document = Html::parse_document(html);
    let record = locate::page_record(&document, decoder);
    if record.is_empty() {
        warn!("No embedded data found on {}", url);
    }

    let view = PageView { document: &document, record: &record };
    let context = ReleaseContext::from_view(&view);
    let trackinfo = tracks::normalize_tracks(&view, &context, url, deep);
    let release = reconcile::build_release(url, &view, context, trackinfo);

    info!(
        "Parsed '{}' by {} ({} tracks, {})",
        release.title,
        release.artist,
        release.trackinfo.len(),
        release.classification
    );
    release
}
