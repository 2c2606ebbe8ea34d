//! Run orchestration.
//!
//! One start URL is either an artist index, which is expanded into every
//! release it lists, or a single release page. Releases are processed one
//! after another, each fully (track pages and covers included) before the
//! next. Only a failed fetch of the artist page aborts a run; any other
//! failure drops the affected release and moves on.

use anyhow::{Context, Result};
use log::{info, warn};
use scraper::Html;
use std::fs;
use std::path::PathBuf;
use url::Url;

use crate::config::ArchiveOptions;
use crate::covers::CoverDownloader;
use crate::decode::ScriptDecoder;
use crate::discover;
use crate::fetch::PageSource;
use crate::files;
use crate::models::{ArtistBundle, ReleaseRecord};
use crate::progress::{create_progress_bar, create_spinner, log_progress};
use crate::release::parse_release_page;
use crate::tracks::DeepFetch;

/// What one start URL produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub name: String,
    pub releases: usize,
    /// JSON file written, if any
    pub output: Option<PathBuf>,
    /// URLs appended to the list file when saving lists
    pub listed: Option<usize>,
}

pub struct Archiver<'a> {
    source: &'a dyn PageSource,
    decoder: &'a dyn ScriptDecoder,
    options: ArchiveOptions,
    covers: CoverDownloader,
}

impl<'a> Archiver<'a> {
    pub fn new(source: &'a dyn PageSource, decoder: &'a dyn ScriptDecoder, options: ArchiveOptions) -> Self {
        let covers = CoverDownloader::new(options.hash_covers);
        Self { source, decoder, options, covers }
    }

    fn deep_fetch(&self) -> Option<DeepFetch<'a>> {
        self.options
            .track_art
            .then_some(DeepFetch { source: self.source, decoder: self.decoder })
    }

    /// Archives whatever `start_url` points at.
    pub fn run(&mut self, start_url: &str) -> Result<RunSummary> {
        let url = Url::parse(start_url).with_context(|| format!("Invalid URL: {start_url}"))?;
        fs::create_dir_all(&self.options.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.options.output_dir.display())
        })?;

        if discover::is_artist_page(&url) {
            self.archive_artist(&url)
        } else {
            self.archive_release(&url)
        }
    }

    /// Fetches and parses one release page.
    pub fn parse_release(&self, url: &str) -> Result<ReleaseRecord> {
        let html = self
            .source
            .fetch_page(url)
            .with_context(|| format!("Failed to fetch release page {url}"))?;
        Ok(parse_release_page(url, &html, self.decoder, self.deep_fetch()))
    }

    /// Artist name and release URLs behind an index page. Failing to fetch
    /// the index page itself is fatal; a failed listing fetch only yields
    /// no releases.
    pub fn discover_releases(&self, index_url: &Url) -> Result<(String, Vec<Url>)> {
        let html = self
            .source
            .fetch_page(index_url.as_str())
            .with_context(|| format!("Failed to fetch artist page {index_url}"))?;
        let document = Html::parse_document(&html);
        let artist = discover::artist_name(&document, index_url);
        info!("Artist: {}", artist);

        let listing = discover::listing_url(index_url);
        if listing == *index_url {
            return Ok((artist, discover::release_urls(&document, &listing)));
        }

        let urls = match self.source.fetch_page(listing.as_str()) {
            Ok(html) => discover::release_urls(&Html::parse_document(&html), &listing),
            Err(e) => {
                warn!("Could not fetch listing page {}: {}", listing, e);
                Vec::new()
            }
        };
        Ok((artist, urls))
    }

    pub fn archive_artist(&mut self, index_url: &Url) -> Result<RunSummary> {
        let spinner = create_spinner("Discovering releases");
        let discovered = self.discover_releases(index_url);
        spinner.finish_and_clear();
        let (artist, urls) = discovered?;

        let total = urls.len() as u64;
        let pb = create_progress_bar(total, &artist);
        let mut releases = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            info!("Processing release {}/{}: {}", i + 1, urls.len(), url);
            match self.parse_release(url.as_str()) {
                Ok(release) => {
                    self.save_covers(&artist, &release);
                    releases.push(release);
                }
                Err(e) => warn!("Skipping release: {:#}", e),
            }
            pb.inc(1);
            log_progress("releases", i as u64 + 1, total, 10);
        }
        pb.finish_and_clear();

        let output = self.options.output_dir.join(format!("{}.json", files::safe_file_stem(&artist)));
        let count = releases.len();
        let listed = self.save_list(&artist, &releases)?;
        let mut bundle = ArtistBundle::new();
        bundle.insert(artist.clone(), releases);
        files::write_json(&output, &bundle)?;

        Ok(RunSummary { name: artist, releases: count, output: Some(output), listed })
    }

    pub fn archive_release(&mut self, url: &Url) -> Result<RunSummary> {
        let release = match self.parse_release(url.as_str()) {
            Ok(release) => release,
            Err(e) => {
                warn!("Nothing archived for {}: {:#}", url, e);
                return Ok(RunSummary { name: url.to_string(), releases: 0, output: None, listed: None });
            }
        };

        self.save_covers(&release.artist, &release);
        let listed = self.save_list(&release.artist, std::slice::from_ref(&release))?;
        let output = self
            .options
            .output_dir
            .join(format!("{}.json", files::release_stem(&release)));
        files::write_json(&output, &release)?;

        Ok(RunSummary { name: release.title, releases: 1, output: Some(output), listed })
    }

    fn save_covers(&mut self, artist: &str, release: &ReleaseRecord) {
        if !self.options.cover_download {
            return;
        }
        let folder = self.options.output_dir.join(files::cover_folder_name(artist));
        if let Err(e) = self.covers.save_release_covers(self.source, release, &folder) {
            warn!("Cover download failed for '{}': {:#}", release.title, e);
        }
    }

    fn save_list(&self, artist: &str, releases: &[ReleaseRecord]) -> Result<Option<usize>> {
        if !self.options.save_list {
            return Ok(None);
        }
        let dir = &self.options.output_dir;
        let list_path = dir.join(format!("{}.txt", files::safe_file_stem(artist)));
        let listed = files::save_url_list(&list_path, &files::exclusion_log_path(dir), releases)?;
        Ok(Some(listed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::LenientDecoder;
    use crate::fetch::tests::FixtureSource;
    use crate::release::tests::release_html;
    use serde_json::Value;

    const TRACK: &str = r#"{title: "Song", id: 7, track_num: 1, duration: 60,
        title_link: "/track/song", file: {"mp3-128": "https://s.example.com/7"}}"#;

    fn artist_index() -> &'static str {
        r#"<html><body>
        <p id="band-name-location"><span class="title">Jane</span></p>
        </body></html>"#
    }

    fn listing() -> &'static str {
        r#"<html><body>
        <ol id="music-grid" data-client-items="[{&quot;page_url&quot;:&quot;/album/first&quot;}]">
          <li class="music-grid-item"><a href="/album/second">Second</a></li>
          <li class="music-grid-item"><a href="/album/gone">Gone</a></li>
        </ol>
        </body></html>"#
    }

    fn site() -> FixtureSource {
        FixtureSource::default()
            .with_page("https://jane.example.com/", artist_index())
            .with_page("https://jane.example.com/music", listing())
            .with_page("https://jane.example.com/album/first", &release_html("First", TRACK))
            .with_page("https://jane.example.com/album/second", &release_html("Second", ""))
    }

    fn options(dir: &std::path::Path) -> ArchiveOptions {
        ArchiveOptions { output_dir: dir.to_path_buf(), ..Default::default() }
    }

    #[test]
    fn test_artist_run_writes_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let source = site();
        let mut archiver = Archiver::new(&source, &LenientDecoder, options(dir.path()));

        let summary = archiver.run("https://jane.example.com/").unwrap();

        // the release that failed to fetch is left out
        assert_eq!(summary.name, "Jane");
        assert_eq!(summary.releases, 2);
        let output = summary.output.unwrap();
        assert_eq!(output, dir.path().join("Jane.json"));

        let bundle: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        let releases = bundle["Jane"].as_array().unwrap();
        let titles: Vec<&str> = releases.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(releases[1]["trackinfo"], serde_json::json!([]));
    }

    #[test]
    fn test_missing_artist_page_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixtureSource::default();
        let mut archiver = Archiver::new(&source, &LenientDecoder, options(dir.path()));

        assert!(archiver.run("https://nobody.example.com/music").is_err());
        assert!(!dir.path().join("nobody.json").exists());
    }

    #[test]
    fn test_music_path_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixtureSource::default()
            .with_page("https://jane.example.com/music", listing())
            .with_page("https://jane.example.com/album/first", &release_html("First", TRACK));
        let mut archiver = Archiver::new(&source, &LenientDecoder, options(dir.path()));

        let summary = archiver.run("https://jane.example.com/music").unwrap();

        // no artist name on the listing: host label is used
        assert_eq!(summary.name, "jane");
        assert_eq!(summary.releases, 1);
        let requested = source.requested.borrow();
        assert_eq!(requested.iter().filter(|u| u.ends_with("/music")).count(), 1);
    }

    #[test]
    fn test_release_run_writes_bare_record() {
        let dir = tempfile::tempdir().unwrap();
        let source = site();
        let mut archiver = Archiver::new(&source, &LenientDecoder, options(dir.path()));

        let summary = archiver.run("https://jane.example.com/album/first").unwrap();

        let output = summary.output.unwrap();
        assert_eq!(output, dir.path().join("Jane - First [101].json"));
        let record: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(record["title"], "First");
        assert_eq!(record["coverUrl_0"], "https://img.example.com/img/a555_0");
    }

    #[test]
    fn test_save_list_and_covers() {
        let dir = tempfile::tempdir().unwrap();
        let source = site().with_image("https://img.example.com/img/a555_0.jpg", "image/jpeg", b"art");
        let mut archiver = Archiver::new(
            &source,
            &LenientDecoder,
            ArchiveOptions {
                save_list: true,
                cover_download: true,
                ..options(dir.path())
            },
        );

        let summary = archiver.run("https://jane.example.com/").unwrap();

        // "Second" has no streamable tracks and is only logged
        assert_eq!(summary.listed, Some(1));
        let list = fs::read_to_string(dir.path().join("Jane.txt")).unwrap();
        assert_eq!(list, "https://jane.example.com/album/first\n");
        let log = fs::read_to_string(files::exclusion_log_path(dir.path())).unwrap();
        assert!(log.contains("album/second (Second): release has no streamable tracks"));

        let covers = dir.path().join("Jane - Album Covers");
        assert!(covers.join("Jane - First [101].jpeg").is_file());
        // both releases share the art URL, downloaded once
        assert!(!covers.join("Jane - Second [101].jpeg").exists());
    }
}
