//! Text extraction from DOM regions.
//!
//! About, credits and lyrics blocks all go through [`text_block`], which
//! keeps the line structure given by `<br>` elements and drops everything
//! else the markup does to whitespace.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Stand-in for `<br>` while whitespace is being collapsed.
const LINE_BREAK: &str = "<<BR>>";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static ABOUT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tralbumData.tralbum-about").unwrap());
static CREDITS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tralbumData.tralbum-credits").unwrap());
static LICENSE: Lazy<Selector> = Lazy::new(|| Selector::parse("#license.info.license").unwrap());
static LICENSE_ICON: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static LABEL_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.back-to-label-link span.back-link-text").unwrap());

/// Multi-line text of an element: `<br>` becomes a line break, any other
/// whitespace run becomes one space, and empty lines are dropped.
pub fn text_block(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(e) if e.name() == "br" => raw.push_str(LINE_BREAK),
            _ => {}
        }
    }

    let collapsed = WHITESPACE_RUN.replace_all(&raw, " ");
    collapsed
        .split(LINE_BREAK)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// [`text_block`] of the first element matching `selector`, if any.
pub fn select_text_block(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(text_block)
}

pub fn about(document: &Html) -> Option<String> {
    select_text_block(document, &ABOUT)
}

pub fn credits(document: &Html) -> Option<String> {
    select_text_block(document, &CREDITS)
}

/// Lyrics of the given track number, taken from its lyrics row.
pub fn lyrics(document: &Html, track_num: &str) -> Option<String> {
    let selector = Selector::parse(&format!("tr#lyrics_row_{track_num} div")).ok()?;
    select_text_block(document, &selector)
}

/// License line, without the text of its leading icon element.
pub fn license(document: &Html) -> Option<String> {
    let license = document.select(&LICENSE).next()?;
    let icon = license.select(&LICENSE_ICON).next().map(|span| span.id());

    let mut text = String::new();
    for node in license.descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let inside_icon = icon.is_some_and(|icon| node.ancestors().any(|a| a.id() == icon));
        if !inside_icon {
            text.push_str(fragment);
        }
    }

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Label name from the "back to X" / "more from X" link: the last line of
/// the link text.
pub fn label_link_text(document: &Html) -> Option<String> {
    let link = document.select(&LABEL_LINK).next()?;
    let text = link.text().collect::<Vec<_>>().join("\n");
    text.split('\n')
        .next_back()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
