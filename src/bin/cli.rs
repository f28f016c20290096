//! wcc CLI
//!
//! Checks every resource of the resource list once and mails a diff for
//! each one that changed. Meant to be invoked periodically by cron.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use wcc::{
    error::Result,
    models::{Config, Options},
    pipeline,
};

/// wcc - Web Change Checker
#[derive(Parser, Debug)]
#[command(name = "wcc", version, about = "Checks web pages for changes")]
struct Cli {
    /// Show only errors
    #[arg(short, long)]
    quiet: bool,

    /// Output more information
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Save required files to DIR
    #[arg(short = 'o', long, value_name = "DIR", default_value = "/var/tmp/wcc")]
    dir: PathBuf,

    /// Check for update but does not save any data
    #[arg(short, long)]
    simulate: bool,

    /// Removes all hash and diff files
    #[arg(short, long)]
    clean: bool,

    /// Sets a tag used in output
    #[arg(short, long, default_value = "web change checker2")]
    tag: String,

    /// Does not send any emails
    #[arg(short, long = "no-mails")]
    no_mails: bool,

    /// Set sender mail address
    #[arg(short, long, value_name = "MAIL")]
    from: Option<String>,

    /// Settings file for HTTP and SMTP behavior
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Resource list, one `url;striphtml;email[;email...]` per line
    #[arg(value_name = "CONFIG_FILE")]
    conf_file: Option<PathBuf>,
}

impl Cli {
    /// Log level filter; debug wins over quiet, quiet over verbose.
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    fn options(&self) -> Result<Options> {
        let mut options = Options::new(self.from.as_deref().unwrap_or_default())?;
        options.dir = self.dir.clone();
        options.tag = self.tag.clone();
        options.simulate = self.simulate;
        options.clean = self.clean;
        options.send_mails = !self.no_mails;
        if let Some(path) = &self.conf_file {
            options.conf_file = path.clone();
        } else {
            log::warn!(
                "No config file given, using default '{}'",
                options.conf_file.display()
            );
        }
        Ok(options)
    }
}

/// Initialize logging based on verbosity flags.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let options = cli.options()?;
    let config = match &cli.settings {
        Some(path) => Config::load_or_default(path),
        None => Config::default(),
    };

    let summary = pipeline::run_checker(&config, &options).await?;
    for report in &summary.reports {
        log::debug!("{} ({}): {:?}", report.host, report.id, report.outcome);
    }

    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
