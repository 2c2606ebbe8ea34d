use anyhow::Result;
use clap::Parser;
use discography_archive::archive::{Archiver, RunSummary};
use discography_archive::config::{
    ArchiveOptions, DelaySpec, FetchConfig, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
use discography_archive::decode::LenientDecoder;
use discography_archive::fetch::HttpFetcher;
use discography_archive::progress::{format_elapsed, set_log_only};
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "discography-archive")]
#[command(about = "Archive release metadata and cover art from artist and release pages")]
struct Args {
    /// Artist index or release page URLs
    #[arg(required = true)]
    urls: Vec<String>,

    /// Fetch every track's own page for track art, credits and license
    #[arg(short = 't', long)]
    track_art: bool,

    /// Download cover art
    #[arg(short = 'c', long)]
    cover_download: bool,

    /// Collapse identical covers of a release by content hash
    #[arg(short = 'H', long)]
    hash_covers: bool,

    /// Append release URLs to "<artist>.txt", logging excluded releases
    #[arg(short = 's', long)]
    save_list: bool,

    /// Delay before each request in ms, fixed ("2000") or a range ("1000-5000")
    #[arg(short = 'd', long)]
    delay: Option<String>,

    #[arg(short = 'r', long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// Base delay between retries in seconds, multiplied by the attempt number
    #[arg(short = 'R', long, default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    retry_delay: u64,

    #[arg(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long)]
    debug: bool,

    /// Hide progress bars, for tail-friendly logs
    #[arg(long)]
    log_only: bool,
}

fn print_summary(summaries: &[RunSummary], elapsed: Duration) {
    println!("\n{:=<60}", "");
    println!("Archive complete!");
    for summary in summaries {
        match &summary.output {
            Some(path) => println!("  {}: {} releases -> {}", summary.name, summary.releases, path.display()),
            None => println!("  {}: nothing written", summary.name),
        }
        if let Some(listed) = summary.listed {
            println!("    URLs listed: {}", listed);
        }
    }
    println!("  Elapsed: {}", format_elapsed(elapsed));
    println!("{:=<60}", "");
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
    set_log_only(args.log_only);

    let fetch_config = FetchConfig {
        delay: args.delay.as_deref().map(DelaySpec::parse),
        max_retries: args.retries,
        retry_delay: Duration::from_secs(args.retry_delay),
    };
    let options = ArchiveOptions {
        track_art: args.track_art,
        cover_download: args.cover_download,
        hash_covers: args.hash_covers,
        save_list: args.save_list,
        output_dir: args.output_dir,
    };
    info!("Options: {:?}", options);

    let start = Instant::now();
    let fetcher = HttpFetcher::new(fetch_config);
    let decoder = LenientDecoder;
    let mut archiver = Archiver::new(&fetcher, &decoder, options);

    let mut summaries = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        info!("Starting {}", url);
        summaries.push(archiver.run(url)?);
    }

    print_summary(&summaries, start.elapsed());
    Ok(())
}
