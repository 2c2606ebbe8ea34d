//! Runs the page parser over a saved HTML file, without any network access.
//!
//! Prints the release record as JSON, or with `--listing` the release URLs
//! discovered on an artist listing page.

use anyhow::{Context, Result};
use clap::Parser;
use discography_archive::decode::LenientDecoder;
use discography_archive::discover;
use discography_archive::release::parse_release_page;
use scraper::Html;
use std::fs;
use std::path::PathBuf;
use url::Url;

#[derive(Parser)]
#[command(name = "inspect-page")]
#[command(about = "Parse a saved page and print what the archiver would extract")]
struct Args {
    /// Saved HTML file
    file: PathBuf,

    /// URL the page was fetched from, used to resolve relative links
    url: String,

    /// Treat the page as an artist listing and print its release URLs
    #[arg(long)]
    listing: bool,

    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let html = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let url = Url::parse(&args.url).with_context(|| format!("Invalid URL: {}", args.url))?;

    if args.listing {
        let document = Html::parse_document(&html);
        println!("Artist: {}", discover::artist_name(&document, &url));
        for release_url in discover::release_urls(&document, &url) {
            println!("{}", release_url);
        }
        return Ok(());
    }

    let release = parse_release_page(url.as_str(), &html, &LenientDecoder, None);
    println!("{}", serde_json::to_string_pretty(&release)?);
    Ok(())
}
