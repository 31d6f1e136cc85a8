//! CLI entry point for `lookout`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use lookout::config::{self, Config};
use lookout::error::LookoutError;
use lookout::pipeline::Pipeline;
use lookout::watch::{Dispatcher, MailDropWatcher};

#[derive(Parser)]
#[command(name = "lookout", version, about)]
struct Cli {
    /// Execute-webhook URL notifications are posted to
    #[arg(long, env = "LOOKOUT_WEBHOOK", value_name = "URL")]
    webhook: Option<String>,

    /// Comma-separated stamp substrings to forward, e.g. "tag(#ultraviolet)".
    /// Empty forwards every Maniphest mail.
    #[arg(long, env = "LOOKOUT_STAMPS", value_name = "FILTERS")]
    stamps: Option<String>,

    /// Directory new mail files are delivered into
    #[arg(long, env = "LOOKOUT_MAIL_DIR", value_name = "DIR")]
    mail_dir: Option<PathBuf>,

    /// Process at most this many mails at once (default: unbounded)
    #[arg(long, value_name = "N")]
    max_in_flight: Option<usize>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Flags and environment variables take precedence over the file.
    fn apply(self, config: &mut Config) {
        if let Some(url) = self.webhook {
            config.webhook.url = Some(url);
        }
        if let Some(stamps) = self.stamps {
            config.filter.stamps = stamps.split(',').map(String::from).collect();
        }
        if let Some(dir) = self.mail_dir {
            config.watch.mail_dir = dir;
        }
        if self.max_in_flight.is_some() {
            config.watch.max_in_flight = self.max_in_flight;
        }
        match self.verbose {
            0 => {}
            1 => config.log.level = "debug".to_string(),
            _ => config.log.level = "trace".to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            setup_logging("info", None);
            error!(tag = e.tag(), error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);
    setup_logging(&config.log.level, config.log.file.as_deref());

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (tag, option) = fatal_fields(&e);
            error!(tag, option, error = format!("{e:#}"), "exiting");
            ExitCode::FAILURE
        }
    }
}

/// Tag (and offending option, for config errors) of the record logged on exit.
fn fatal_fields(e: &anyhow::Error) -> (&'static str, Option<&'static str>) {
    match e.downcast_ref::<LookoutError>() {
        Some(LookoutError::InvalidConfig { option, .. }) => ("invalid_config", Some(*option)),
        Some(other) => (other.tag(), None),
        None => ("fatal", None),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    if pipeline.filter().is_empty() {
        warn!(
            tag = "missing_stamps",
            "LOOKOUT_STAMPS is empty, all phabricator emails will be matched"
        );
    }

    let dispatcher = Dispatcher::new(config.watch.max_in_flight);
    info!(
        mail_dir = %config.watch.mail_dir.display(),
        filters = ?pipeline.filter().filters(),
        max_in_flight = ?config.watch.max_in_flight,
        "starting lookout"
    );

    let watcher = MailDropWatcher::start(&config.watch.mail_dir, move |path| {
        let pipeline = Arc::clone(&pipeline);
        dispatcher.spawn(async move {
            pipeline.handle_create(&path).await;
        });
    })
    .with_context(|| format!("cannot watch {}", config.watch.mail_dir.display()))?;

    watcher.run().await.context("mail drop watcher stopped")
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, log_file: Option<&Path>) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file_layer = log_file.and_then(|path| {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty())?;
        let name = path.file_name()?;
        std::fs::create_dir_all(dir).ok()?;
        let appender = tracing_appender::rolling::never(dir, name);
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender),
        )
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
