//! Cover art URL resolution.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Returned instead of a URL when a page has no art link. Check for it with
/// [`is_art_url`] before downloading or rewriting.
pub const ART_NOT_FOUND: &str = "Album art not found";

static ART_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("#tralbumArt a").unwrap());

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// Rewrites an image href to its index-0 (largest) variant:
/// `.../a1234_5.jpg` becomes `.../a1234_0.jpg`. Hrefs without a numeric
/// `_N` suffix come back unchanged.
pub fn highest_resolution(href: &str) -> String {
    let Some((stem, extension)) = href.rsplit_once('.') else {
        return href.to_string();
    };
    match stem.rsplit_once('_') {
        Some((prefix, suffix))
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) =>
        {
            format!("{prefix}_0.{extension}")
        }
        _ => href.to_string(),
    }
}

/// Art URL of a page, or [`ART_NOT_FOUND`].
pub fn art_url(document: &Html) -> String {
    document
        .select(&ART_LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(highest_resolution)
        .unwrap_or_else(|| ART_NOT_FOUND.to_string())
}

pub fn is_art_url(url: &str) -> bool {
    !url.is_empty() && !url.contains(ART_NOT_FOUND)
}

/// Storage form of an art URL: trailing `.jpg` removed.
pub fn strip_jpg(url: &str) -> String {
    url.strip_suffix(".jpg").unwrap_or(url).to_string()
}

/// Inverse of [`strip_jpg`]. `None` for the sentinel or an empty value.
pub fn stored_to_download_url(stored: &str) -> Option<String> {
    if !is_art_url(stored) {
        return None;
    }
    let lower = stored.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Some(stored.to_string())
    } else {
        Some(format!("{stored}.jpg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_suffix_rewritten() {
        assert_eq!(
            highest_resolution("https://f4.example.com/img/art/a1234_5.jpg"),
            "https://f4.example.com/img/art/a1234_0.jpg"
        );
        assert_eq!(
            highest_resolution("https://f4.example.com/img/a9_16.png"),
            "https://f4.example.com/img/a9_0.png"
        );
    }

    #[test]
    fn test_no_numeric_suffix_unchanged() {
        let href = "https://f4.example.com/img/art/a1234.jpg";
        assert_eq!(highest_resolution(href), href);
        let href = "https://f4.example.com/img/art/a_b.jpg";
        assert_eq!(highest_resolution(href), href);
        assert_eq!(highest_resolution("noext"), "noext");
    }

    #[test]
    fn test_art_url_from_page() {
        let document = Html::parse_document(
            r#"<div id="tralbumArt"><a class="popupImage" href="https://img.example.com/img/a77_10.jpg"><img></a></div>"#,
        );
        assert_eq!(art_url(&document), "https://img.example.com/img/a77_0.jpg");

        let document = Html::parse_document("<div id=\"tralbumArt\"></div>");
        assert_eq!(art_url(&document), ART_NOT_FOUND);
    }

    #[test]
    fn test_stored_form_round_trip() {
        let stored = strip_jpg("https://img.example.com/img/a77_0.jpg");
        assert_eq!(stored, "https://img.example.com/img/a77_0");
        assert_eq!(
            stored_to_download_url(&stored).as_deref(),
            Some("https://img.example.com/img/a77_0.jpg")
        );
        assert_eq!(strip_jpg(ART_NOT_FOUND), ART_NOT_FOUND);
        assert_eq!(stored_to_download_url(ART_NOT_FOUND), None);
        assert_eq!(
            stored_to_download_url("https://img.example.com/a_0.png").as_deref(),
            Some("https://img.example.com/a_0.png")
        );
    }
}
