//! Cover art downloads.
//!
//! Covers of a release land directly in the artist's cover folder, unless
//! its tracks carry their own art: then the release gets a subfolder holding
//! the release cover and every track cover. With hash de-duplication on, a
//! subfolder whose images turn out identical collapses back into a single
//! file in the artist folder.

use anyhow::{Context, Result};
use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::art;
use crate::fetch::PageSource;
use crate::files;
use crate::models::ReleaseRecord;

const IMAGE_FILE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// True when at least one track page reported an art id that differs from
/// the release's own.
pub fn has_unique_track_art(release: &ReleaseRecord) -> bool {
    release
        .trackinfo
        .iter()
        .filter_map(|track| track.page.as_ref())
        .filter_map(|page| page.art_id.as_ref())
        .any(|art_id| !art_id.is_null() && Some(art_id) != release.art_id.as_ref())
}

/// File extension for a downloaded image: from the content type when it is
/// an image type, otherwise from the URL.
pub fn image_extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(subtype) = content_type
        .filter(|ct| ct.contains("image"))
        .and_then(|ct| ct.split(';').next())
        .and_then(|ct| ct.trim().rsplit('/').next())
    {
        return if ["jpeg", "jpg", "png", "gif"].contains(&subtype) {
            subtype.to_string()
        } else {
            "jpg".to_string()
        };
    }
    url.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && !ext.contains('/'))
        .unwrap_or("jpg")
        .to_string()
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_FILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Removes byte-identical images from `folder`, keeping the first in file
/// name order. Returns the images that remain.
pub fn dedupe_by_hash(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("Failed to list {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort();

    let mut seen: FxHashMap<String, PathBuf> = FxHashMap::default();
    let mut kept = Vec::new();
    for path in images {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read {} to hash it: {}", path.display(), e);
                continue;
            }
        };
        let digest = format!("{:x}", md5::compute(&bytes));
        if seen.contains_key(&digest) {
            match fs::remove_file(&path) {
                Ok(()) => info!("Deleted duplicate cover: {}", path.display()),
                Err(e) => warn!("Error deleting {}: {}", path.display(), e),
            }
        } else {
            seen.insert(digest, path.clone());
            kept.push(path);
        }
    }
    Ok(kept)
}

/// Downloads covers and remembers every URL it has fetched for the whole
/// process, so shared art is only saved once.
#[derive(Default)]
pub struct CoverDownloader {
    downloaded: FxHashSet<String>,
    hash_covers: bool,
}

impl CoverDownloader {
    pub fn new(hash_covers: bool) -> Self {
        Self { downloaded: FxHashSet::default(), hash_covers }
    }

    pub fn already_downloaded(&self, url: &str) -> bool {
        self.downloaded.contains(url)
    }

    /// Downloads `url` into `folder` as `stem.<ext>` unless it was fetched
    /// before. Failures are logged, not returned.
    fn download(&mut self, source: &dyn PageSource, url: &str, folder: &Path, stem: &str) -> Option<PathBuf> {
        if self.downloaded.contains(url) {
            return None;
        }
        match source.fetch_image(url) {
            Ok(image) => {
                let extension = image_extension(image.content_type.as_deref(), url);
                let path = folder.join(format!("{stem}.{extension}"));
                self.downloaded.insert(url.to_string());
                match fs::write(&path, &image.bytes) {
                    Ok(()) => {
                        info!("Downloaded cover: {}", path.display());
                        Some(path)
                    }
                    Err(e) => {
                        warn!("Could not write cover {}: {}", path.display(), e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Failed to download cover {}: {}", url, e);
                None
            }
        }
    }

    /// Saves the covers of one release below `cover_folder`.
    pub fn save_release_covers(
        &mut self,
        source: &dyn PageSource,
        release: &ReleaseRecord,
        cover_folder: &Path,
    ) -> Result<()> {
        fs::create_dir_all(cover_folder)
            .with_context(|| format!("Failed to create {}", cover_folder.display()))?;
        let release_stem = files::release_stem(release);
        let release_cover = art::stored_to_download_url(&release.cover_url_0);

        if !has_unique_track_art(release) {
            if let Some(url) = release_cover {
                self.download(source, &url, cover_folder, &release_stem);
            }
            return Ok(());
        }

        let release_folder = cover_folder.join(&release_stem);
        fs::create_dir_all(&release_folder)
            .with_context(|| format!("Failed to create {}", release_folder.display()))?;
        info!("Release has unique track covers. Saving all covers to {}", release_folder.display());

        if let Some(url) = release_cover {
            self.download(source, &url, &release_folder, &release_stem);
        }
        for track in &release.trackinfo {
            let Some(page) = &track.page else { continue };
            if let Some(url) = art::stored_to_download_url(&page.track_cover_url_0) {
                self.download(source, &url, &release_folder, &files::track_stem(track));
            }
        }

        if self.hash_covers {
            self.collapse_identical(&release_folder, cover_folder, &release_stem)?;
        }
        Ok(())
    }

    fn collapse_identical(&self, release_folder: &Path, cover_folder: &Path, release_stem: &str) -> Result<()> {
        let kept = dedupe_by_hash(release_folder)?;
        if kept.len() > 1 {
            info!("Found {} unique covers after hashing.", kept.len());
            return Ok(());
        }

        info!("All covers of {} are identical, keeping one.", release_stem);
        if let Some(single) = kept.first() {
            let extension = single.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
            let target = cover_folder.join(format!("{release_stem}.{extension}"));
            fs::rename(single, &target)
                .with_context(|| format!("Could not move cover to {}", target.display()))?;
        }
        if let Err(e) = fs::remove_dir(release_folder) {
            warn!("Could not remove directory {}: {}", release_folder.display(), e);
        }
        Ok(())
    }
}
