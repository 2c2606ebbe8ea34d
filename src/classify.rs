//! Pricing classification heuristic.
//!
//! Checks run in a fixed order and the first hit decides:
//! name-your-price marker text, free-download button text, free-download
//! flags in the embedded data, then a minimum price of exactly zero.
//! Nothing matching means `paid`.

use log::debug;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::locate::PageRecord;
use crate::models::Classification;

static NYP_MARKER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.buyItemExtra.buyItemNyp.secondaryText").unwrap());
static FREE_DOWNLOAD_BUTTON: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h4.ft.compound-button.main-button button.download-link.buy-link").unwrap()
});

const NYP_PHRASES: [&str; 2] = ["name your price", "値段を決めて下さい"];
const FREE_DOWNLOAD_PHRASES: [&str; 2] = ["free download", "無料ダウンロード"];

type Check = fn(&Html, &PageRecord) -> Option<Classification>;

const CHECKS: [(&str, Check); 4] = [
    ("name-your-price marker", nyp_marker),
    ("free download button", free_download_button),
    ("free download flag", free_download_flag),
    ("zero minimum price", zero_minimum_price),
];

pub fn classify(document: &Html, record: &PageRecord) -> Classification {
    for (name, check) in CHECKS {
        if let Some(classification) = check(document, record) {
            debug!("Classified as {} by {}", classification, name);
            return classification;
        }
    }
    Classification::Paid
}

fn element_text_contains(document: &Html, selector: &Selector, phrases: &[&str]) -> bool {
    document.select(selector).next().is_some_and(|element| {
        let text = element.text().collect::<String>().to_lowercase();
        phrases.iter().any(|phrase| text.contains(phrase))
    })
}

fn nyp_marker(document: &Html, _: &PageRecord) -> Option<Classification> {
    element_text_contains(document, &NYP_MARKER, &NYP_PHRASES).then_some(Classification::Nyp)
}

fn free_download_button(document: &Html, _: &PageRecord) -> Option<Classification> {
    element_text_contains(document, &FREE_DOWNLOAD_BUTTON, &FREE_DOWNLOAD_PHRASES)
        .then_some(Classification::Free)
}

fn free_download_flag(_: &Html, record: &PageRecord) -> Option<Classification> {
    let track_flagged = record
        .trackinfo()
        .iter()
        .any(|track| track.get("free_album_download").and_then(Value::as_bool) == Some(true));
    let page_flagged = record.get("freeDownload").and_then(Value::as_bool) == Some(true);
    (track_flagged || page_flagged).then_some(Classification::Free)
}

fn zero_minimum_price(_: &Html, record: &PageRecord) -> Option<Classification> {
    record
        .nested(&["current", "minimum_price"])
        .and_then(Value::as_f64)
        .filter(|price| *price == 0.0)
        .map(|_| Classification::Nyp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::{merge_fragments, Fragment, FragmentSource};
    use serde_json::json;

    fn record(value: Value) -> PageRecord {
        merge_fragments(vec![Fragment {
            source: FragmentSource::Tralbum,
            fields: value.as_object().cloned().unwrap(),
        }])
    }

    const FREE_BUTTON: &str = r#"<h4 class="ft compound-button main-button">
        <button class="download-link buy-link">Free Download</button></h4>"#;

    #[test]
    fn test_default_is_paid() {
        let document = Html::parse_document("<div></div>");
        let record = record(json!({"current": {"minimum_price": 7.0}}));
        assert_eq!(classify(&document, &record), Classification::Paid);
    }

    #[test]
    fn test_nyp_marker_english_and_localized() {
        let document = Html::parse_document(
            r#"<span class="buyItemExtra buyItemNyp secondaryText">name your price</span>"#,
        );
        assert_eq!(classify(&document, &PageRecord::default()), Classification::Nyp);

        let document = Html::parse_document(
            r#"<span class="buyItemExtra buyItemNyp secondaryText">値段を決めて下さい</span>"#,
        );
        assert_eq!(classify(&document, &PageRecord::default()), Classification::Nyp);
    }

    #[test]
    fn test_free_button_precedes_zero_price() {
        let document = Html::parse_document(FREE_BUTTON);
        let record = record(json!({"current": {"minimum_price": 0}}));
        assert_eq!(classify(&document, &record), Classification::Free);
    }

    #[test]
    fn test_free_flag_precedes_zero_price() {
        let document = Html::parse_document("<div></div>");
        let record = record(json!({
            "current": {"minimum_price": 0.0},
            "trackinfo": [{"free_album_download": false}, {"free_album_download": true}]
        }));
        assert_eq!(classify(&document, &record), Classification::Free);
    }

    #[test]
    fn test_zero_price_is_nyp() {
        let document = Html::parse_document("<div></div>");
        let record = record(json!({"current": {"minimum_price": 0.0}}));
        assert_eq!(classify(&document, &record), Classification::Nyp);
    }

    #[test]
    fn test_unrelated_button_text_ignored() {
        let document = Html::parse_document(
            r#"<h4 class="ft compound-button main-button">
            <button class="download-link buy-link">Buy Digital Album</button></h4>"#,
        );
        assert_eq!(classify(&document, &PageRecord::default()), Classification::Paid);
    }
}
