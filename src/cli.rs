//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use coursedl::DEFAULT_MAX_ATTEMPTS;

/// Batch download course lecture videos and subtitles.
///
/// Coursedl walks a course outline, extracts direct media URLs from lecture
/// pages, and downloads them with resumable transfers. Discovered results
/// are persisted, so interrupted runs pick up where they left off.
#[derive(Parser, Debug)]
#[command(name = "coursedl")]
#[command(author, version, about)]
pub struct Args {
    /// Course URLs or course-v1 slugs to scrape and download
    pub courses: Vec<String>,

    /// Skip live scraping and download previously persisted results only
    #[arg(long)]
    pub from_results: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output and progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,

    /// Directory to download course media into
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Netscape-format cookie file for the authenticated session
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Override the state directory (defaults to ~/.coursedl)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Base URL of the course platform
    #[arg(long, default_value = "https://courses.edx.org")]
    pub base_url: String,

    /// Maximum attempts per transfer (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,

    /// Skip exporting text lectures as HTML documents
    #[arg(long)]
    pub no_documents: bool,
}
