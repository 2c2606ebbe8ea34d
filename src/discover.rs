//! Release discovery on artist index pages.
//!
//! The listing page carries its releases twice: as a JSON manifest in an
//! attribute of the grid container, and as rendered links inside the grid.
//! Either may be missing or incomplete, so both are read and unioned.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

static MUSIC_GRID: Lazy<Selector> = Lazy::new(|| Selector::parse("ol#music-grid").unwrap());
static GRID_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li.music-grid-item a").unwrap());
static ARTIST_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#band-name-location .title").unwrap());

const ITEMS_MANIFEST_ATTR: &str = "data-client-items";
const LISTING_PATH: &str = "/music";

/// True for artist index URLs: an empty path, `/`, `/music` or `/music/`.
pub fn is_artist_page(url: &Url) -> bool {
    matches!(url.path(), "" | "/" | "/music" | "/music/")
}

/// Canonical listing URL of an index page: root paths become `/music`,
/// anything else is kept.
pub fn listing_url(url: &Url) -> Url {
    let mut listing = url.clone();
    if matches!(url.path(), "" | "/") {
        listing.set_path(LISTING_PATH);
    }
    listing
}

/// Display name of the artist behind an index page. Falls back to the
/// first label of the host name.
pub fn artist_name(document: &Html, page_url: &Url) -> String {
    let from_page = document
        .select(&ARTIST_NAME)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty());

    from_page.unwrap_or_else(|| {
        let fallback = host_label(page_url);
        warn!("Artist name not found on page, using '{}'", fallback);
        fallback
    })
}

fn host_label(url: &Url) -> String {
    url.host_str()
        .and_then(|host| host.split('.').next())
        .unwrap_or("unknown-artist")
        .to_string()
}

/// Keeps first-seen order while dropping repeats.
#[derive(Default)]
struct UrlSet {
    seen: FxHashSet<String>,
    ordered: Vec<Url>,
}

impl UrlSet {
    fn insert(&mut self, url: Url) {
        if self.seen.insert(url.as_str().to_string()) {
            self.ordered.push(url);
        }
    }
}

fn manifest_urls(grid: scraper::ElementRef<'_>, base: &Url) -> Result<Vec<Url>> {
    let Some(manifest) = grid.value().attr(ITEMS_MANIFEST_ATTR) else {
        return Ok(Vec::new());
    };
    let items: Vec<Value> =
        serde_json::from_str(manifest).context("Failed to parse items manifest JSON")?;
    Ok(items
        .iter()
        .filter_map(|item| item.get("page_url").and_then(Value::as_str))
        .filter_map(|href| base.join(href).ok())
        .collect())
}

/// Every release URL listed on a parsed listing page, resolved against
/// `base` and de-duplicated. Manifest entries come first.
pub fn release_urls(document: &Html, base: &Url) -> Vec<Url> {
    let Some(grid) = document.select(&MUSIC_GRID).next() else {
        warn!("Could not find music grid on the page. No releases found.");
        return Vec::new();
    };

    let mut urls = UrlSet::default();
    match manifest_urls(grid, base) {
        Ok(found) => {
            debug!("Items manifest lists {} releases", found.len());
            found.into_iter().for_each(|url| urls.insert(url));
        }
        Err(e) => warn!("{:#}", e),
    }

    for link in grid.select(&GRID_LINKS) {
        if let Some(url) = link.value().attr("href").and_then(|href| base.join(href).ok()) {
            urls.insert(url);
        }
    }

    info!("Found a total of {} unique release links.", urls.ordered.len());
    urls.ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn listing(manifest: &str, links: &[&str]) -> Html {
        let items: String = links
            .iter()
            .map(|href| format!(r#"<li class="music-grid-item"><a href="{href}">x</a></li>"#))
            .collect();
        Html::parse_document(&format!(
            r#"<ol id="music-grid" data-client-items="{manifest}">{items}</ol>"#
        ))
    }

    #[test]
    fn test_is_artist_page() {
        assert!(is_artist_page(&url("https://jane.example.com")));
        assert!(is_artist_page(&url("https://jane.example.com/")));
        assert!(is_artist_page(&url("https://jane.example.com/music")));
        assert!(is_artist_page(&url("https://jane.example.com/music/")));
        assert!(!is_artist_page(&url("https://jane.example.com/album/first")));
    }

    #[test]
    fn test_listing_url_normalization() {
        assert_eq!(
            listing_url(&url("https://jane.example.com/")).as_str(),
            "https://jane.example.com/music"
        );
        assert_eq!(
            listing_url(&url("https://jane.example.com/music")).as_str(),
            "https://jane.example.com/music"
        );
    }

    #[test]
    fn test_union_of_manifest_and_links() {
        let base = url("https://jane.example.com/music");
        let document = listing(
            "[{&quot;page_url&quot;:&quot;/album/a&quot;}]",
            &["/album/b"],
        );
        let found: Vec<String> =
            release_urls(&document, &base).iter().map(|u| u.to_string()).collect();
        assert_eq!(
            found,
            vec![
                "https://jane.example.com/album/a".to_string(),
                "https://jane.example.com/album/b".to_string(),
            ]
        );
    }

    #[test]
    fn test_same_url_in_both_sources_counted_once() {
        let base = url("https://jane.example.com/music");
        let document = listing(
            "[{&quot;page_url&quot;:&quot;/album/a&quot;}]",
            &["https://jane.example.com/album/a"],
        );
        assert_eq!(release_urls(&document, &base).len(), 1);
    }

    #[test]
    fn test_broken_manifest_still_uses_links() {
        let base = url("https://jane.example.com/music");
        let document = listing("not json", &["/track/t"]);
        let found = release_urls(&document, &base);
        assert_eq!(found, vec![url("https://jane.example.com/track/t")]);
    }

    #[test]
    fn test_missing_grid_is_empty() {
        let base = url("https://jane.example.com/music");
        let document = Html::parse_document("<div></div>");
        assert!(release_urls(&document, &base).is_empty());
    }

    #[test]
    fn test_artist_name_with_fallback() {
        let page = url("https://jane.example.com/music");
        let document = Html::parse_document(
            r#"<p id="band-name-location"><span class="title"> Jane Doe </span></p>"#,
        );
        assert_eq!(artist_name(&document, &page), "Jane Doe");

        let document = Html::parse_document("<div></div>");
        assert_eq!(artist_name(&document, &page), "jane");
    }
}
