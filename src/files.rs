//! Output files: safe names, JSON records, URL lists and the exclusion log.

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

use crate::models::{ExclusionReason, ReleaseRecord, TrackRecord};

/// Names longer than this get their title shortened.
const MAX_NAME_LEN: usize = 100;
/// Length a shortened name is cut back to.
const TARGET_NAME_LEN: usize = 95;
const ELLIPSIS: &str = "(...)";

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Control and zero-width characters
static INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x1f\x7f\u{200b}-\u{200d}\u{feff}]").unwrap());

/// Characters not allowed in file names on common filesystems
static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/?%*:|"<>]+"#).unwrap());

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());
static LEADING_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.+").unwrap());
static MULTI_HYPHEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

// ============================================================================
// Names
// ============================================================================

/// Filesystem-safe version of `name` (no extension added).
pub fn safe_file_stem(name: &str) -> String {
    let name: String = name.nfc().collect();
    let name = INVISIBLE.replace_all(&name, "");
    let name = name.replace(" | ", " - ");
    let name = INVALID_CHARS.replace_all(&name, "-");
    let name = MULTI_SPACE.replace_all(&name, " ");
    let name = LEADING_DOTS.replace(&name, "");
    let name = MULTI_HYPHEN.replace_all(&name, "-");
    let name = name.strip_suffix('.').unwrap_or(&name);
    name.trim().to_string()
}

/// Fills `template` (containing one `{title}`) and shortens the title when
/// the result would exceed the name limit.
fn fit_title(template: &str, title: &str) -> String {
    let full = template.replace("{title}", title);
    if full.chars().count() <= MAX_NAME_LEN {
        return safe_file_stem(&full);
    }
    let fixed_len = template.replace("{title}", "").chars().count();
    let available = TARGET_NAME_LEN.saturating_sub(fixed_len + ELLIPSIS.len());
    let shortened: String = title.chars().take(available).collect();
    safe_file_stem(&template.replace("{title}", &format!("{shortened}{ELLIPSIS}")))
}

fn display_id(id: Option<&serde_json::Value>) -> String {
    match id {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "None".to_string(),
        Some(other) => other.to_string(),
    }
}

/// `"{artist} - {title} [{item_id}]"`, sanitized and length-limited.
pub fn release_stem(release: &ReleaseRecord) -> String {
    let template = format!(
        "{} - {{title}} [{}]",
        release.artist,
        display_id(release.item_id.as_ref())
    );
    fit_title(&template, &release.title)
}

/// `"{track_num} - {artist} - {title} [{track_id}]"`, sanitized and
/// length-limited.
pub fn track_stem(track: &TrackRecord) -> String {
    let template = format!(
        "{} - {} - {{title}} [{}]",
        track.track_num,
        track.artist,
        display_id(track.track_id.as_ref())
    );
    fit_title(&template, &track.title)
}

pub fn cover_folder_name(artist: &str) -> String {
    safe_file_stem(&format!("{artist} - Album Covers"))
}

// ============================================================================
// Writers
// ============================================================================

/// Pretty-printed JSON (4-space indent) with non-ASCII text kept as is.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut serializer)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("Saved data to {}", path.display());
    Ok(())
}

fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Dated log collecting every release left out of a URL list.
pub fn exclusion_log_path(dir: &Path) -> PathBuf {
    dir.join(format!("excluded-{}.log", Local::now().format("%Y-%m-%d")))
}

/// Appends the URLs of `releases` to `list_path`, one per line. Preorders
/// and releases without streamable tracks are written to the exclusion log
/// instead. Returns how many URLs were listed.
pub fn save_url_list(list_path: &Path, log_path: &Path, releases: &[ReleaseRecord]) -> Result<usize> {
    let mut listed = Vec::new();
    let mut excluded = Vec::new();

    for release in releases {
        match ExclusionReason::for_release(release) {
            None => listed.push(release.url.clone()),
            Some(reason) => excluded.push(format!(
                "[{}] {} ({}): {}",
                Local::now().format("%H:%M:%S"),
                release.url,
                release.title,
                reason
            )),
        }
    }

    append_lines(list_path, &listed)?;
    append_lines(log_path, &excluded)?;
    if !excluded.is_empty() {
        info!("Excluded {} releases, see {}", excluded.len(), log_path.display());
    }
    Ok(listed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::{sample_release, sample_track};
    use serde_json::json;

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("AC/DC: Live?"), "AC-DC- Live-");
        assert_eq!(safe_file_stem("A | B"), "A - B");
        assert_eq!(safe_file_stem("...hidden."), "hidden");
        assert_eq!(safe_file_stem("a\u{200b}b  c"), "ab c");
        assert_eq!(safe_file_stem("x -- y"), "x - y");
        assert_eq!(safe_file_stem("  padded  "), "padded");
    }

    #[test]
    fn test_safe_file_stem_nfc() {
        assert_eq!(safe_file_stem("Cafe\u{301}"), "Caf\u{e9}");
    }

    #[test]
    fn test_release_stem() {
        let release = sample_release();
        assert_eq!(release_stem(&release), "Jane - First [101]");
    }

    #[test]
    fn test_release_stem_truncates_long_title() {
        let mut release = sample_release();
        release.title = "x".repeat(200);
        let stem = release_stem(&release);
        assert!(stem.chars().count() <= TARGET_NAME_LEN);
        assert!(stem.ends_with("(...) [101]"));
        assert!(stem.starts_with("Jane - xxx"));
    }

    #[test]
    fn test_track_stem() {
        let track = sample_track();
        assert_eq!(track_stem(&track), "1 - Jane - Song [7]");

        let mut track = sample_track();
        track.track_id = None;
        assert_eq!(track_stem(&track), "1 - Jane - Song [None]");
    }

    #[test]
    fn test_write_json_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&path, &json!({"title": "値段"})).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("値段"));
        assert!(written.contains("\n    \"title\""));
    }

    #[test]
    fn test_save_url_list_with_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("Jane.txt");
        let log = exclusion_log_path(dir.path());

        let included = sample_release();
        let mut preorder = sample_release();
        preorder.url = "https://jane.example.com/album/soon".to_string();
        preorder.is_preorder = Some(true);
        let mut silent = sample_release();
        silent.url = "https://jane.example.com/album/silent".to_string();
        silent.trackinfo.clear();

        let listed = save_url_list(&list, &log, &[included, preorder, silent]).unwrap();
        assert_eq!(listed, 1);
        assert_eq!(
            fs::read_to_string(&list).unwrap(),
            "https://jane.example.com/album/first\n"
        );

        let log_text = fs::read_to_string(&log).unwrap();
        assert_eq!(log_text.lines().count(), 2);
        assert!(log_text.contains("album/soon (First): release is a preorder"));
        assert!(log_text.contains("album/silent (First): release has no streamable tracks"));
    }
}
