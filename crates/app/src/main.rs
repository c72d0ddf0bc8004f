use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use services::{
    Clock, FixedPrompt, MeasurementProtocolTag, MemoryIdentifierStore, PageBootstrap,
    ParticipantPrompt, Signal, SimulatedPlayer, SimulatedSession, TagLoader, TokioScheduler,
    WatchSessionDriver,
};
use tracing_subscriber::EnvFilter;
use url::Url;
use watch_core::WatchTracker;
use watch_core::model::{
    AnalyticsSettingsDraft, LifecycleSignal, SessionSettings, SessionSettingsDraft, SettingsError,
};

mod console;
mod script;

use console::{StdinPrompt, StdoutTag};
use script::Step;

const DEFAULT_PAGE_URL: &str = "https://study.example/watch";
const DEFAULT_DURATION_SECS: f64 = 120.0;
// Collect requests are fire-and-forget; give them a moment before exit.
const DELIVERY_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDuration { raw: String },
    InvalidPageUrl { raw: String },
    Settings(SettingsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
            ArgsError::InvalidPageUrl { raw } => write!(f, "invalid --page-url value: {raw}"),
            ArgsError::Settings(err) => write!(f, "invalid settings: {err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- replay [options]   # virtual time, instant");
    eprintln!("  cargo run -p app -- live   [options]   # wall-clock timers");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --script <path>          JSON-lines page visit (default: stdin)");
    eprintln!("  --page-url <url>         page address, e.g. with ?PROLIFIC_ID=...");
    eprintln!("  --title <text>           page title for the page view");
    eprintln!("  --video-id <id>          embedded video id");
    eprintln!("  --study-id <id>          study the page belongs to");
    eprintln!("  --duration <secs>        simulated video length (default 120)");
    eprintln!("  --measurement-id <id>    send to GA4 instead of stdout");
    eprintln!("  --no-prompt              never ask for a participant id");
    eprintln!("  --dry-run                print events to stdout even if configured");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WATCH_PAGE_URL, WATCH_VIDEO_ID, WATCH_STUDY_ID, WATCH_VIDEO_DURATION,");
    eprintln!("  WATCH_MEASUREMENT_ID, WATCH_API_SECRET, WATCH_COLLECT_ENDPOINT, WATCH_TAG_URL,");
    eprintln!("  RUST_LOG (default: warn)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Replay,
    Live,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "replay" => Some(Self::Replay),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    page_url: Url,
    title: String,
    video_id: String,
    study_id: String,
    duration_secs: f64,
    script: Option<PathBuf>,
    measurement_id: Option<String>,
    prompt: bool,
    dry_run: bool,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut page_url = env("WATCH_PAGE_URL").unwrap_or_else(|| DEFAULT_PAGE_URL.into());
        let mut duration = env("WATCH_VIDEO_DURATION");
        let mut parsed = Self {
            page_url: parse_page_url(DEFAULT_PAGE_URL)?,
            title: "Study video".into(),
            video_id: env("WATCH_VIDEO_ID").unwrap_or_default(),
            study_id: env("WATCH_STUDY_ID").unwrap_or_default(),
            duration_secs: DEFAULT_DURATION_SECS,
            script: None,
            measurement_id: env("WATCH_MEASUREMENT_ID"),
            prompt: true,
            dry_run: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--script" => parsed.script = Some(require_value(args, "--script")?.into()),
                "--page-url" => page_url = require_value(args, "--page-url")?,
                "--title" => parsed.title = require_value(args, "--title")?,
                "--video-id" => parsed.video_id = require_value(args, "--video-id")?,
                "--study-id" => parsed.study_id = require_value(args, "--study-id")?,
                "--duration" => duration = Some(require_value(args, "--duration")?),
                "--measurement-id" => {
                    parsed.measurement_id = Some(require_value(args, "--measurement-id")?);
                }
                "--no-prompt" => parsed.prompt = false,
                "--dry-run" => parsed.dry_run = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        parsed.page_url = parse_page_url(&page_url)?;
        if let Some(raw) = duration {
            parsed.duration_secs = match raw.trim().parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => secs,
                _ => return Err(ArgsError::InvalidDuration { raw }),
            };
        }
        Ok(parsed)
    }

    fn session_settings(&self) -> Result<SessionSettings, ArgsError> {
        SessionSettingsDraft::new(self.video_id.clone(), self.study_id.clone())
            .validate()
            .map_err(ArgsError::Settings)
    }

    fn analytics_tag(
        &self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Box<dyn TagLoader>, ArgsError> {
        let measurement_id = match (&self.measurement_id, self.dry_run) {
            (Some(id), false) => id.clone(),
            _ => return Ok(Box::new(StdoutTag)),
        };
        let settings = AnalyticsSettingsDraft {
            measurement_id,
            api_secret: env("WATCH_API_SECRET"),
            collect_endpoint: env("WATCH_COLLECT_ENDPOINT"),
            tag_url: env("WATCH_TAG_URL"),
        }
        .validate()
        .map_err(ArgsError::Settings)?;
        Ok(Box::new(MeasurementProtocolTag::new(settings)))
    }

    fn sends_remotely(&self) -> bool {
        self.measurement_id.is_some() && !self.dry_run
    }
}

fn parse_page_url(raw: &str) -> Result<Url, ArgsError> {
    Url::parse(raw.trim()).map_err(|_| ArgsError::InvalidPageUrl { raw: raw.to_string() })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_steps(path: Option<&PathBuf>) -> Result<Vec<Step>, script::ScriptError> {
    match path {
        Some(path) => script::parse(BufReader::new(File::open(path)?)),
        None => script::parse(io::stdin().lock()),
    }
}

/// Replays the visit in virtual time; waits cost nothing.
fn replay(
    settings: SessionSettings,
    page: &PageBootstrap,
    steps: &[Step],
    duration: f64,
) -> WatchTracker {
    let clock = Clock::manual(Clock::system().now());
    let mut session = SimulatedSession::new(settings, page.transport(), duration, clock);

    for step in steps {
        session.run_for(step.delay());
        match step.action.perform(session.player()) {
            Some(signal) => session.send(signal),
            None => session.pump(),
        }
    }
    if !session.tracker().is_finalized() {
        session.leave(LifecycleSignal::Unload);
    }
    session.into_tracker()
}

/// Plays the visit against wall-clock timers through the driver's run loop.
async fn live(
    settings: SessionSettings,
    page: &PageBootstrap,
    steps: &[Step],
    duration: f64,
) -> Result<WatchTracker, tokio::task::JoinError> {
    let clock = Clock::system();
    let (signals, rx) = tokio::sync::mpsc::unbounded_channel();
    let player =
        Arc::new(SimulatedPlayer::new(duration, clock.clone()).with_signals(signals.clone()));
    let driver = WatchSessionDriver::new(
        settings,
        player.clone(),
        page.transport(),
        Arc::new(TokioScheduler::new(signals.clone())),
        clock,
    );
    let session = tokio::spawn(driver.run(rx));

    for step in steps {
        tokio::time::sleep(step.delay()).await;
        if let Some(signal) = step.action.perform(&player) {
            if signals.send(signal).is_err() {
                break;
            }
        }
    }
    // Closing the page; ignored if a script step already finalized.
    let _ = signals.send(Signal::Lifecycle(LifecycleSignal::Unload));
    session.await
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Replay,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Replay,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter(), &env_var).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let settings = parsed.session_settings()?;
    let tag = parsed.analytics_tag(&env_var)?;
    let steps = load_steps(parsed.script.as_ref())?;

    // Stdin carries the script when no file is given.
    let prompt: Box<dyn ParticipantPrompt> = if parsed.prompt && parsed.script.is_some() {
        Box::new(StdinPrompt)
    } else {
        Box::new(FixedPrompt::cancelled())
    };
    let page = PageBootstrap::load(
        parsed.page_url.clone(),
        parsed.title.clone(),
        prompt.as_ref(),
        &MemoryIdentifierStore::new(),
    );
    page.connect_analytics(tag.as_ref()).await;

    let tracker = match cmd {
        Command::Replay => replay(settings, &page, &steps, parsed.duration_secs),
        Command::Live => live(settings, &page, &steps, parsed.duration_secs).await?,
    };

    if let Some(summary) = tracker.summary() {
        tracing::info!(
            watched = summary.total_watched_secs,
            plays = summary.play_count,
            completion = summary.completion_rate_percent(),
            exit = summary.exit_signal.as_str(),
            "session summary"
        );
    }
    if parsed.sends_remotely() {
        tokio::time::sleep(DELIVERY_GRACE).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<Args, ArgsError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let lookup = move |key: &str| env.get(key).cloned();
        let mut args = args.iter().map(|arg| (*arg).to_string());
        Args::parse(&mut args, &lookup)
    }

    #[test]
    fn flags_override_environment() {
        let args = parse(
            &["--video-id", "flag-vid", "--duration", "90"],
            &[("WATCH_VIDEO_ID", "env-vid"), ("WATCH_STUDY_ID", "env-study")],
        )
        .unwrap();
        assert_eq!(args.video_id, "flag-vid");
        assert_eq!(args.study_id, "env-study");
        assert_eq!(args.duration_secs, 90.0);
        assert!(args.session_settings().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--duration", "-3"], &[]),
            Err(ArgsError::InvalidDuration { .. })
        ));
        assert!(matches!(
            parse(&["--page-url", "not a url"], &[]),
            Err(ArgsError::InvalidPageUrl { .. })
        ));
        assert!(matches!(
            parse(&["--title"], &[]),
            Err(ArgsError::MissingValue { flag: "--title" })
        ));
        assert!(matches!(parse(&["--bogus"], &[]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn missing_ids_fail_settings() {
        let args = parse(&[], &[]).unwrap();
        assert!(matches!(args.session_settings(), Err(ArgsError::Settings(_))));
    }

    #[test]
    fn dry_run_never_sends_remotely() {
        let args = parse(&["--measurement-id", "G-TEST", "--dry-run"], &[]).unwrap();
        assert!(!args.sends_remotely());
        let args = parse(&[], &[("WATCH_MEASUREMENT_ID", "G-TEST")]).unwrap();
        assert!(args.sends_remotely());
    }

    #[test]
    fn replay_reports_finalized_session() {
        let args = parse(
            &["--video-id", "vid", "--study-id", "study", "--duration", "40"],
            &[],
        )
        .unwrap();
        let page = PageBootstrap::load(
            args.page_url.clone(),
            "t",
            &FixedPrompt::cancelled(),
            &MemoryIdentifierStore::new(),
        );
        let visit = r#"
{"action": "ready"}
{"after_ms": 500, "action": "gesture"}
{"after_ms": 20000, "action": "pause"}
"#;
        let steps = script::parse(visit.as_bytes()).unwrap();

        let tracker = replay(args.session_settings().unwrap(), &page, &steps, args.duration_secs);
        let summary = tracker.summary().unwrap();
        assert_eq!(summary.total_watched_secs, 20.0);
        assert_eq!(summary.exit_signal, LifecycleSignal::Unload);
    }
}
