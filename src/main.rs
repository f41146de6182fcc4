use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use termcolor::{BufferWriter, ColorChoice, WriteColor};
use tracing_subscriber::EnvFilter;

use kodegen_bundler_publish::config::PublishConfig;
use kodegen_bundler_publish::credentials::{Platform, WorkflowOptions, run_build};
use kodegen_bundler_publish::packager::ExternalPackager;
use kodegen_bundler_publish::platform_api::HttpPlatformService;
use kodegen_bundler_publish::prompts::TerminalPrompter;
use kodegen_bundler_publish::{error as error_msg, status};

// Operator-facing output goes through termcolor and ignores write errors;
// diagnostics go through tracing to stderr (RUST_LOG, or -v for debug).

#[derive(Parser)]
#[command(name = "kodegen_publish")]
#[command(version, about = "Publish a kodegen project and start a remote mobile build")]
struct Cli {
    /// Path to publish config file (TOML)
    #[arg(long, short = 'c', global = true, env = "KODEGEN_PUBLISH_CONFIG")]
    config: Option<PathBuf>,

    /// Show debug diagnostics
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect credentials, publish the project and queue a build
    Build {
        /// Target platform
        #[arg(value_enum, default_value = "ios")]
        platform: Platform,

        /// Ignore stored credentials and enter all of them again
        #[arg(long)]
        clear_credentials: bool,

        /// Project directory containing app.json
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// Show packager process status
    Status {
        /// List every process the packager manages
        #[arg(long)]
        all: bool,

        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error_msg!("{:#}", e);
        std::process::exit(1);
    }
}

/// `-v` forces debug; otherwise a usable `RUST_LOG` wins over the `warn` default.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }

    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

async fn run(cli: Cli) -> Result<()> {
    let config = PublishConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Build {
            platform,
            clear_credentials,
            project_dir,
        } => {
            let service = HttpPlatformService::new(&config)?;
            let packager = ExternalPackager::new(config.packager.clone());
            let mut prompter = TerminalPrompter;
            let options = WorkflowOptions {
                platform,
                clear_credentials,
            };

            let submission = run_build(
                &project_dir,
                &config,
                options,
                &service,
                &packager,
                &mut prompter,
            )
            .await?;

            let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
            let mut buffer = bufwtr.buffer();
            let _ = writeln!(&mut buffer, "\n✅ {platform} build started: {}", submission.id);
            if let Some(url) = &submission.status_url {
                let _ = writeln!(&mut buffer, "   Follow progress at: {url}");
            }
            let _ = buffer.reset();
            let _ = bufwtr.print(&buffer);
            Ok(())
        }
        Commands::Status { all, project_dir } => {
            let packager = ExternalPackager::new(config.packager.clone());
            status::show_status(&packager, &project_dir, all).await?;
            Ok(())
        }
    }
}
