//! Embedded-data locator.
//!
//! Finds the carriers of semi-structured data inside a parsed page, decodes
//! each of them independently and merges the results into one [`PageRecord`].

use log::{debug, warn};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::decode::ScriptDecoder;

static PAGE_DATA: Lazy<Selector> = Lazy::new(|| Selector::parse("#pagedata").unwrap());
static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static TRALBUM_SCRIPTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[data-tralbum]").unwrap());

// ============================================================================
// Raw Fragments
// ============================================================================

/// Where a fragment was found on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSource {
    /// `data-blob` attribute of the page-data container
    PageData,
    /// `application/ld+json` script body
    LdJson,
    /// `data-tralbum` attribute of a script element
    Tralbum,
}

/// One raw, undecoded carrier of embedded data.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment<'a> {
    pub source: FragmentSource,
    pub text: &'a str,
}

/// Yields the raw fragments of a page in merge order: page-data blob,
/// ld+json body, then every `data-tralbum` script in document order.
pub fn raw_fragments(document: &Html) -> impl Iterator<Item = RawFragment<'_>> + '_ {
    let page_data = document
        .select(&PAGE_DATA)
        .next()
        .and_then(|div| div.value().attr("data-blob"))
        .map(|text| RawFragment { source: FragmentSource::PageData, text });

    let ld_json = document
        .select(&LD_JSON)
        .next()
        .and_then(|script| script.text().next())
        .filter(|text| !text.trim().is_empty())
        .map(|text| RawFragment { source: FragmentSource::LdJson, text });

    let tralbum = document.select(&TRALBUM_SCRIPTS).filter_map(|script| {
        script
            .value()
            .attr("data-tralbum")
            .map(|text| RawFragment { source: FragmentSource::Tralbum, text })
    });

    page_data.into_iter().chain(ld_json).chain(tralbum)
}

// ============================================================================
// Decoded Fragments
// ============================================================================

/// A fragment after decoding. Failed decodes hold an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub source: FragmentSource,
    pub fields: Map<String, Value>,
}

/// Decodes one raw fragment. Never fails: anything that does not decode to
/// a JSON object is replaced by an empty object and logged.
pub fn decode_fragment(raw: &RawFragment<'_>, decoder: &dyn ScriptDecoder) -> Fragment {
    let fields = match decoder.decode(raw.text) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            warn!(
                "{:?} fragment decoded to a non-object value ({}), ignoring it",
                raw.source,
                json_kind(&other)
            );
            Map::new()
        }
        Err(e) => {
            warn!("Could not decode {:?} fragment: {}", raw.source, e);
            Map::new()
        }
    };
    Fragment { source: raw.source, fields }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Page Record
// ============================================================================

/// Merged view over every fragment of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRecord {
    fields: Map<String, Value>,
    ld_json: Option<Map<String, Value>>,
}

/// Merges fragments key-wise in the given order; on collision the later
/// fragment wins. The ld+json fragment is also kept on its own.
pub fn merge_fragments(fragments: impl IntoIterator<Item = Fragment>) -> PageRecord {
    let mut record = PageRecord::default();
    for fragment in fragments {
        if fragment.source == FragmentSource::LdJson && record.ld_json.is_none() {
            record.ld_json = Some(fragment.fields.clone());
        }
        record.fields.extend(fragment.fields);
    }
    record
}

/// Locates, decodes and merges all embedded data of a page.
pub fn page_record(document: &Html, decoder: &dyn ScriptDecoder) -> PageRecord {
    let fragments: Vec<Fragment> = raw_fragments(document)
        .map(|raw| decode_fragment(&raw, decoder))
        .collect();
    debug!("Merging {} embedded fragments", fragments.len());
    merge_fragments(fragments)
}

impl PageRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Nested lookup, e.g. `nested(&["current", "title"])`. JSON nulls are
    /// treated as absent.
    pub fn nested(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.get(first)?;
        for key in rest {
            value = value.get(key)?;
        }
        Some(value).filter(|v| !v.is_null())
    }

    pub fn str(&self, path: &[&str]) -> Option<&str> {
        self.nested(path).and_then(Value::as_str)
    }

    /// Raw track entries; an absent or malformed `trackinfo` is empty.
    pub fn trackinfo(&self) -> &[Value] {
        self.get("trackinfo")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ld_json(&self) -> Option<&Map<String, Value>> {
        self.ld_json.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::LenientDecoder;
    use serde_json::json;

    const PAGE: &str = r#"<html><head>
        <script type="application/ld+json">{"name": "Ld Name", "keywords": ["a"]}</script>
        </head><body>
        <div id="pagedata" data-blob="{&quot;artist&quot;:&quot;Blob&quot;,&quot;band_id&quot;:1}"></div>
        <script data-tralbum="{artist: 'Tralbum', trackinfo: [{title: 'One'}],}"></script>
        <script data-tralbum="{broken"></script>
        </body></html>"#;

    #[test]
    fn test_raw_fragments_in_priority_order() {
        let document = Html::parse_document(PAGE);
        let sources: Vec<FragmentSource> =
            raw_fragments(&document).map(|raw| raw.source).collect();
        assert_eq!(
            sources,
            vec![
                FragmentSource::PageData,
                FragmentSource::LdJson,
                FragmentSource::Tralbum,
                FragmentSource::Tralbum,
            ]
        );
    }

    #[test]
    fn test_later_fragment_wins_and_broken_fragment_is_empty() {
        let document = Html::parse_document(PAGE);
        let record = page_record(&document, &LenientDecoder);

        assert_eq!(record.str(&["artist"]), Some("Tralbum"));
        assert_eq!(record.get("band_id"), Some(&json!(1)));
        assert_eq!(record.str(&["name"]), Some("Ld Name"));
        assert_eq!(record.trackinfo().len(), 1);
        assert_eq!(
            record.ld_json().and_then(|ld| ld.get("name")),
            Some(&json!("Ld Name"))
        );
    }

    #[test]
    fn test_decode_failure_yields_empty_object() {
        let raw = RawFragment { source: FragmentSource::Tralbum, text: "{nope" };
        let fragment = decode_fragment(&raw, &LenientDecoder);
        assert!(fragment.fields.is_empty());

        let raw = RawFragment { source: FragmentSource::Tralbum, text: "[1, 2]" };
        assert!(decode_fragment(&raw, &LenientDecoder).fields.is_empty());
    }

    #[test]
    fn test_missing_trackinfo_is_empty() {
        let record = merge_fragments(vec![Fragment {
            source: FragmentSource::PageData,
            fields: json!({"trackinfo": null}).as_object().cloned().unwrap(),
        }]);
        assert!(record.trackinfo().is_empty());
        assert!(PageRecord::default().trackinfo().is_empty());
    }

    #[test]
    fn test_nested_treats_null_as_absent() {
        let record = merge_fragments(vec![Fragment {
            source: FragmentSource::Tralbum,
            fields: json!({"current": {"title": null, "id": 5}}).as_object().cloned().unwrap(),
        }]);
        assert_eq!(record.nested(&["current", "title"]), None);
        assert_eq!(record.nested(&["current", "id"]), Some(&json!(5)));
        assert_eq!(record.nested(&["missing", "id"]), None);
    }
}
