//! Load test CLI for the image server.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use imageserver_load_test::{runner, Catalog, LoadRunner, TestConfig};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "load-test")]
#[command(about = "Synthetic traffic generator for the image server", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test
    Run(RunArgs),

    /// Probe the target's landing page and exit
    Check {
        /// IP address or hostname to test
        #[arg(long, env = "LOAD_TEST_TARGET_HOST", default_value = "127.0.0.1")]
        target_host: String,
    },

    /// List fixtures per category
    Catalog {
        /// Location of test images grouped by tag
        #[arg(long, env = "LOAD_TEST_IMAGES_PATH", default_value = "data")]
        images_path: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Scenario YAML file; flags below override its values
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Location of test images grouped by tag
    #[arg(long, env = "LOAD_TEST_IMAGES_PATH")]
    images_path: Option<PathBuf>,

    /// IP address or hostname to test
    #[arg(long, env = "LOAD_TEST_TARGET_HOST")]
    target_host: Option<String>,

    /// Request rate of upload requests
    #[arg(long)]
    upload_rate: Option<u32>,

    /// Request rate of ui requests
    #[arg(long)]
    ui_rate: Option<u32>,

    /// Request rate of search requests
    #[arg(long)]
    search_rate: Option<u32>,

    /// Request rate of download requests
    #[arg(long)]
    download_rate: Option<u32>,

    /// Duration of the load test (e.g. 10m)
    #[arg(long, value_parser = humantime::parse_duration)]
    test_duration: Option<Duration>,

    /// Duration of the rampup to test rate (e.g. 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    rampup_time: Option<Duration>,

    /// Number of random users to generate
    #[arg(long)]
    user_count: Option<u32>,

    /// Number of parallel workers per workload
    #[arg(long)]
    workers: Option<usize>,

    /// How often each workload logs a summary (e.g. 10s)
    #[arg(long, value_parser = humantime::parse_duration)]
    report_interval: Option<Duration>,

    /// Final report format: table (default) or json
    #[arg(short, long, default_value = "table")]
    output: String,
}

impl RunArgs {
    fn into_config(self) -> anyhow::Result<(TestConfig, String)> {
        let mut config = match &self.scenario {
            Some(path) => TestConfig::from_file(path)?,
            None => TestConfig::default(),
        };

        if let Some(v) = self.images_path {
            config.images_path = v;
        }
        if let Some(v) = self.target_host {
            config.target_host = v;
        }
        if let Some(v) = self.upload_rate {
            config.upload_rate = v;
        }
        if let Some(v) = self.ui_rate {
            config.ui_rate = v;
        }
        if let Some(v) = self.search_rate {
            config.search_rate = v;
        }
        if let Some(v) = self.download_rate {
            config.download_rate = v;
        }
        if let Some(v) = self.test_duration {
            config.test_duration = v;
        }
        if let Some(v) = self.rampup_time {
            config.rampup_time = v;
        }
        if let Some(v) = self.user_count {
            config.user_count = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.report_interval {
            config.report_interval = v;
        }

        Ok((config, self.output))
    }
}

fn init_tracing(log_level: &str, json: bool) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run(args) => {
            let (config, output) = args.into_config()?;
            let runner = match LoadRunner::new(config) {
                Ok(runner) => runner,
                Err(e) => {
                    error!(error = %e, "Invalid configuration");
                    std::process::exit(1);
                }
            };

            let config = runner.config();
            info!(
                host = %config.target_host,
                workers = config.workers,
                rampup = %humantime::format_duration(config.rampup_time),
                duration = %humantime::format_duration(config.test_duration),
                "Starting load test"
            );

            let summary = match runner::run_until_ctrl_c(&runner).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            };

            match output.as_str() {
                "json" => println!("{}", summary.format_json()?),
                _ => println!("{}", summary.format_table()),
            }
            Ok(())
        }
        Commands::Check { target_host } => {
            let config = TestConfig {
                target_host: target_host.clone(),
                ..TestConfig::default()
            };
            let runner = LoadRunner::new(config)?;
            if let Err(e) = runner.check_host().await {
                error!("{}", e);
                std::process::exit(1);
            }
            info!("target host is alive: {}", target_host);
            Ok(())
        }
        Commands::Catalog { images_path } => {
            let catalog = match Catalog::load(&images_path) {
                Ok(catalog) => catalog,
                Err(e) => {
                    error!(
                        "failed to load images from path '{}': {}",
                        images_path.display(),
                        e
                    );
                    std::process::exit(1);
                }
            };

            println!("{} images in {}:", catalog.len(), catalog.root().display());
            for (category, count) in catalog.count_by_category() {
                println!("  {:<20} {}", category, count);
            }
            Ok(())
        }
    }
}
