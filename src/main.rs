use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

use nap::config::RunConfig;
use nap::context::{Context, RunProgress};
use nap::http::HttpClient;
use nap::report;

/// Run declarative API test workflows
#[derive(Parser)]
#[command(name = "nap", version)]
#[command(about = "Run HTTP requests, routines and scripts and assert on the results", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the request, routine or script at the path provided
    Run {
        /// Workflow file to run
        target: PathBuf,

        /// Add environment variables from a file (repeatable, merged in order)
        #[arg(short = 'e', long = "env", value_name = "PATH")]
        environments: Vec<String>,

        /// Add a single variable to the run as a <name>=<value> pair
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Hide progress bars
        #[arg(short, long)]
        quiet: bool,
    },
}

fn init_logging(config: &RunConfig) {
    let filter = EnvFilter::try_from_env("NAP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.verbose >= 2)
        .with_thread_ids(config.verbose >= 3)
        .with_line_number(config.verbose >= 3)
        .init();

    debug!("nap started with verbosity level: {}", config.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            target,
            environments,
            params,
            quiet,
        } => {
            let config = RunConfig::new(target)
                .with_environments(environments)
                .with_verbose(cli.verbose)
                .with_quiet(quiet)
                .with_raw_params(params);

            match config {
                Ok(config) => {
                    init_logging(&config);
                    run(config).await
                }
                Err(e) => Err(e.into()),
            }
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {}", e);
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Run the configured target; `Ok(false)` means the run completed with failures.
async fn run(config: RunConfig) -> anyhow::Result<bool> {
    let started = Instant::now();

    let variables = config.load_environment()?;
    let mut ctx = Context::new(".", variables, HttpClient::production());
    if !config.quiet {
        ctx = ctx.with_progress(RunProgress::new());
    }

    let target = config.target.to_string_lossy().into_owned();
    let result = nap::run_path(ctx, target).await;

    print!("{}", report::render(&result, config.verbose > 0));

    let (passed, failed) = result.pass_fail_counts();
    println!(
        "{}",
        report::summary_line(started.elapsed().as_millis(), passed, failed)
    );

    Ok(failed == 0 && result.is_passing())
}
