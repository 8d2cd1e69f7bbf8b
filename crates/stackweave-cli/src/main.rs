//! stackweave CLI tool.

use clap::{Parser, Subcommand};
use stackweave_config::resolver::DEFAULT_MAX_PASSES;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stackweave")]
#[command(about = "Render macro templates and deploy them as stacks", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "STACKWEAVE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a configuration and deploy its stacks
    Deploy {
        /// Configuration file
        config: PathBuf,
        /// Deploy only this stack and its dependencies
        #[arg(short, long)]
        stack: Option<String>,
        /// Seconds between two stack status polls
        #[arg(long, env = "STACKWEAVE_POLL_DELAY", default_value_t = 10)]
        poll_delay: u64,
        /// Retries for resource lookups, negative retries forever
        #[arg(short, long, env = "STACKWEAVE_RETRY", default_value_t = 0, allow_negative_numbers = true)]
        retry: i64,
        /// Cap on configuration resolution passes
        #[arg(long, env = "STACKWEAVE_MAX_PASSES", default_value_t = DEFAULT_MAX_PASSES)]
        max_passes: usize,
    },
    /// Render a template, or only the configuration, as JSON
    Generate {
        /// Template file
        template: PathBuf,
        /// Output file
        output: PathBuf,
        /// Configuration file `GetConfig` reads from
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Retries for resource lookups, negative retries forever
        #[arg(short, long, env = "STACKWEAVE_RETRY", default_value_t = 0, allow_negative_numbers = true)]
        retry: i64,
        /// Write the resolved configuration instead of the template
        #[arg(long, alias = "generate_config_only")]
        generate_config_only: bool,
        /// Cap on configuration resolution passes
        #[arg(long, env = "STACKWEAVE_MAX_PASSES", default_value_t = DEFAULT_MAX_PASSES)]
        max_passes: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Deploy {
            config,
            stack,
            poll_delay,
            retry,
            max_passes,
        } => {
            let settings = commands::Settings { retry, max_passes };
            commands::deploy::run(
                &settings,
                &config,
                stack.as_deref(),
                Duration::from_secs(poll_delay),
            )
            .await?;
        }
        Commands::Generate {
            template,
            output,
            config,
            retry,
            generate_config_only,
            max_passes,
        } => {
            let settings = commands::Settings { retry, max_passes };
            let target = if generate_config_only {
                commands::generate::Target::Config
            } else {
                commands::generate::Target::Template(&template)
            };
            commands::generate::run(&settings, target, config.as_deref(), &output).await?;
        }
    }

    Ok(())
}
