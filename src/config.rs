//! Run configuration.

use log::warn;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;

/// Range used when a delay value cannot be understood.
pub const DEFAULT_DELAY_RANGE_MS: (f64, f64) = (1000.0, 3000.0);

pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Artificial delay applied before every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelaySpec {
    Fixed(f64),
    /// Uniformly drawn from `min..=max` milliseconds
    Range(f64, f64),
}

impl DelaySpec {
    /// Parses `"2000"` or `"1000-5000"` (milliseconds). Anything invalid
    /// falls back to the default range with a warning.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let parsed = match value.split_once('-') {
            Some((min, max)) => min
                .trim()
                .parse::<f64>()
                .ok()
                .zip(max.trim().parse::<f64>().ok())
                .map(|(min, max)| DelaySpec::Range(min, max)),
            None => value.parse::<f64>().ok().map(DelaySpec::Fixed),
        };

        let (min, max) = DEFAULT_DELAY_RANGE_MS;
        match parsed {
            Some(spec) if spec.is_valid() => spec,
            Some(_) => {
                warn!("Invalid delay values '{value}'. Using {min}-{max} ms.");
                DelaySpec::Range(min, max)
            }
            None => {
                warn!("Invalid delay '{value}'. Using {min}-{max} ms.");
                DelaySpec::Range(min, max)
            }
        }
    }

    fn is_valid(&self) -> bool {
        match *self {
            DelaySpec::Fixed(ms) => ms.is_finite() && ms >= 0.0,
            DelaySpec::Range(min, max) => {
                min.is_finite() && max.is_finite() && min >= 0.0 && max >= min
            }
        }
    }

    /// Bounds in milliseconds.
    pub fn bounds_ms(&self) -> (f64, f64) {
        match *self {
            DelaySpec::Fixed(ms) => (ms, ms),
            DelaySpec::Range(min, max) => (min, max),
        }
    }

    /// Draws one delay.
    pub fn sample(&self) -> Duration {
        let (min, max) = self.bounds_ms();
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_secs_f64(ms / 1000.0)
    }
}

/// HTTP behaviour shared by every fetch of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub delay: Option<DelaySpec>,
    pub max_retries: u32,
    /// Multiplied by the attempt number between retries.
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay: None,
            max_retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Feature toggles and output location of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveOptions {
    /// Fetch each track's own page for art, credits and license.
    pub track_art: bool,
    pub cover_download: bool,
    /// De-duplicate per-release cover folders by content hash.
    pub hash_covers: bool,
    pub save_list: bool,
    pub output_dir: PathBuf,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            track_art: false,
            cover_download: false,
            hash_covers: false,
            save_list: false,
            output_dir: PathBuf::from("."),
        }
    }
}
