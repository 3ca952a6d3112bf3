//! Application wiring for the coursedl binary.
//!
//! Owns the top-level control flow: load persisted state, scrape requested
//! courses, flush discoveries, run the sequential download loop, and save
//! state on every exit path - normal completion, user interrupt, and
//! unhandled error alike.

mod exit;
mod progress;

use std::io::Write;
use std::path::PathBuf;

use tracing::{error, info, warn};
use url::Url;

use coursedl::{
    DiscoveredMedia, DiscoveryCollector, Error, FailureType, NullProgress, OutlineScraper,
    PlatformUrls, ProgressSink, ResultStore, ResumableTransfer, RetryDecision, RetryPolicy,
    Scraper, Session, SessionClient, TransferKind, TransferOutcome, TransferTask, classify_error,
    load_session, parse_course_reference,
};

use crate::cli::Args;

pub use exit::ProcessExit;

/// Local file that collects diagnostics from unhandled errors.
const ERROR_LOG_FILE: &str = "coursedl-error.log";

/// Counters from one run, used to derive the exit code.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Transfers that completed.
    pub completed: usize,
    /// Transfers that failed after all attempts.
    pub failed: usize,
    /// Transfers skipped because the file already existed.
    pub skipped: usize,
    /// Courses the user asked for.
    pub courses_requested: usize,
    /// Courses the session could not access.
    pub courses_unauthorized: usize,
}

/// What happened to one transfer task.
enum TaskResult {
    Completed,
    Skipped,
    Failed,
}

/// Runs the tool to completion and maps the outcome to an exit code.
pub async fn run(args: &Args) -> ProcessExit {
    let store = match &args.state_dir {
        Some(dir) => ResultStore::new(dir),
        None => match ResultStore::in_home_dir() {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "cannot locate state directory");
                return ProcessExit::Failure;
            }
        },
    };

    // A read failure here is fatal: without prior state we could duplicate
    // or clobber earlier work.
    let state = match store.load() {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to load persisted state");
            append_error_log(&e);
            return ProcessExit::Failure;
        }
    };

    let mut collector = DiscoveryCollector::new();
    collector.seed(state);

    let outcome = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => None,
        result = run_pipeline(args, &store, &mut collector) => Some(result),
    };

    // Save on every exit path. A save failure is reported but never masks
    // the outcome that got us here.
    if let Err(e) = store.save(&collector.snapshot()) {
        error!(error = %e, "failed to save results");
    }

    match outcome {
        None => {
            warn!("cancelled by user; partial files are kept for resume");
            ProcessExit::Cancelled
        }
        Some(Ok(report)) => {
            info!(
                completed = report.completed,
                failed = report.failed,
                skipped = report.skipped,
                "run complete"
            );
            exit::determine_exit(&report)
        }
        Some(Err(e @ Error::InvalidReference { .. })) => {
            error!(error = %e, "invalid course reference");
            ProcessExit::InvalidReference
        }
        Some(Err(e)) => {
            error!(error = %e, "unexpected failure");
            append_error_log(&e);
            ProcessExit::Failure
        }
    }
}

async fn run_pipeline(
    args: &Args,
    store: &ResultStore,
    collector: &mut DiscoveryCollector,
) -> Result<RunReport, Error> {
    // Validate every course reference before touching the network; one bad
    // locator fails the run without attempting any transfer.
    let mut courses = Vec::with_capacity(args.courses.len());
    for input in &args.courses {
        courses.push(parse_course_reference(input)?);
    }

    if courses.is_empty() && !args.from_results {
        warn!("no course references given; pass --from-results to download persisted results");
        return Ok(RunReport::default());
    }

    let session = load_session_from_args(args)?;
    let client = SessionClient::new(&session);

    let mut courses_unauthorized = 0usize;
    if args.from_results {
        info!("downloading previously persisted results only");
    } else {
        let base = Url::parse(&args.base_url)
            .map_err(|_| Error::invalid_url(args.base_url.clone()))?;
        let scraper = OutlineScraper::new(client.clone(), PlatformUrls::new(base), &args.output_dir)
            .with_document_export(!args.no_documents);

        for course in &courses {
            match scraper.scrape_course(course, collector).await {
                Ok(()) => {}
                Err(Error::NotAuthorized { course }) => {
                    // One inaccessible course never aborts the others.
                    warn!(course = %course, "not authorized, skipping course");
                    courses_unauthorized += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // Flush discoveries before any transfer so a fatal exit below never
        // loses scraped work.
        store.save(&collector.snapshot())?;
    }

    let progress: Box<dyn ProgressSink> = if args.quiet {
        Box::new(NullProgress)
    } else {
        Box::new(progress::TransferBar::new())
    };

    let mut report = download_all(args, &client, collector.results(), progress.as_ref()).await;
    report.courses_requested = courses.len();
    report.courses_unauthorized = courses_unauthorized;
    Ok(report)
}

/// Downloads every recorded result sequentially: one task at a time, video
/// before its subtitle, in discovery order.
async fn download_all(
    args: &Args,
    client: &SessionClient,
    results: &[DiscoveredMedia],
    progress: &dyn ProgressSink,
) -> RunReport {
    let engine = ResumableTransfer::new(client.clone());
    let policy = RetryPolicy::with_max_attempts(u32::from(args.max_retries));
    let mut report = RunReport::default();

    info!(records = results.len(), "starting downloads");

    for media in results {
        let Some(video_url) = &media.video_url else {
            continue;
        };

        let video_task = TransferTask {
            url: video_url.clone(),
            destination: media.video_path(),
            kind: TransferKind::Video,
            display_name: format!("{}.mp4", media.base_filename),
        };
        tally(
            transfer_with_retry(&engine, &video_task, &policy, progress).await,
            &mut report,
        );

        let Some(subtitle_url) = &media.subtitle_url else {
            continue;
        };

        let subtitle_destination = media.subtitle_path();
        if subtitle_destination.exists() {
            info!(path = %subtitle_destination.display(), "already downloaded, skipping subtitle");
            report.skipped += 1;
            continue;
        }

        // Required precondition: the transcript handler serves the format
        // chosen by a prior state-changing POST.
        if let Err(e) = engine.select_subtitle_format(subtitle_url).await {
            warn!(error = %e, "skipping subtitle transfer");
            report.failed += 1;
            continue;
        }

        let subtitle_task = TransferTask {
            url: subtitle_url.clone(),
            destination: subtitle_destination,
            kind: TransferKind::Subtitle,
            display_name: format!("{}.srt", media.base_filename),
        };
        tally(
            transfer_with_retry(&engine, &subtitle_task, &policy, progress).await,
            &mut report,
        );
    }

    report
}

fn tally(result: TaskResult, report: &mut RunReport) {
    match result {
        TaskResult::Completed => report.completed += 1,
        TaskResult::Skipped => report.skipped += 1,
        TaskResult::Failed => report.failed += 1,
    }
}

/// Runs one task through the engine with the bounded retry policy.
async fn transfer_with_retry(
    engine: &ResumableTransfer,
    task: &TransferTask,
    policy: &RetryPolicy,
    progress: &dyn ProgressSink,
) -> TaskResult {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let failure = match engine.transfer(task, progress).await {
            Ok(TransferOutcome::AlreadyComplete) => {
                info!(task = %task.display_name, "already downloaded, skipping");
                return TaskResult::Skipped;
            }
            Ok(TransferOutcome::Success { bytes }) => {
                info!(task = %task.display_name, bytes, "downloaded");
                return TaskResult::Completed;
            }
            Ok(TransferOutcome::Incomplete { expected, actual }) => {
                warn!(
                    task = %task.display_name,
                    expected,
                    actual,
                    "transfer incomplete, will resume"
                );
                FailureType::Transient
            }
            Ok(TransferOutcome::Corrupt { expected, actual }) => {
                // Partial was deleted; a retry restarts from offset 0.
                warn!(
                    task = %task.display_name,
                    expected,
                    actual,
                    "stale partial discarded"
                );
                FailureType::Transient
            }
            Err(e) => {
                warn!(task = %task.display_name, attempt, error = %e, "transfer attempt failed");
                classify_error(&e)
            }
        };

        match policy.should_retry(failure, attempt) {
            RetryDecision::Retry { delay, .. } => tokio::time::sleep(delay).await,
            RetryDecision::DoNotRetry { reason } => {
                warn!(task = %task.display_name, %reason, "giving up on transfer");
                return TaskResult::Failed;
            }
        }
    }
}

/// Builds the session from the cookie file: an explicit `--cookies` path
/// must load, the default location is optional.
fn load_session_from_args(args: &Args) -> Result<Session, Error> {
    if let Some(path) = &args.cookies {
        return load_session(path);
    }

    let default_path = default_cookie_path();
    match default_path {
        Some(path) if path.exists() => load_session(&path),
        _ => {
            warn!("no cookie file found; proceeding without an authenticated session");
            Ok(Session::anonymous())
        }
    }
}

fn default_cookie_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".coursedl").join("cookies.txt"))
}

/// Appends one diagnostic line for post-mortem inspection.
fn append_error_log(error: &Error) {
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(ERROR_LOG_FILE)
        .and_then(|mut file| writeln!(file, "{error}"));
    match result {
        Ok(()) => info!(file = ERROR_LOG_FILE, "diagnostic appended to error log"),
        Err(e) => warn!(error = %e, "could not write error log"),
    }
}
