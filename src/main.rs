use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covup::cli::{self, UploadOptions};
use covup::config::Config;
use covup::upload::DEFAULT_ENDPOINT;

/// covup: parse Clover or LCOV reports and submit them as coverage jobs.
#[derive(Parser)]
#[command(name = "covup", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a coverage report and print the job JSON.
    Parse {
        /// Path to the coverage report.
        report: PathBuf,

        /// Override format detection (clover, lcov).
        #[arg(long)]
        format: Option<String>,

        /// Directory source paths are resolved against (default: cwd).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Parse a coverage report, merge build settings and submit it.
    Upload {
        /// Path to the coverage report.
        report: PathBuf,

        /// Override format detection (clover, lcov).
        #[arg(long)]
        format: Option<String>,

        /// Directory source paths are resolved against (default: cwd).
        #[arg(long)]
        root: Option<PathBuf>,

        /// YAML configuration file (default: <root>/.coveralls.yml).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Repository token.
        #[arg(long)]
        repo_token: Option<String>,

        /// CI service name.
        #[arg(long)]
        service_name: Option<String>,

        /// Flag name for this job.
        #[arg(long)]
        flag_name: Option<String>,

        /// Mark the job as one of several parallel jobs.
        #[arg(long)]
        parallel: bool,

        /// Attach branch, HEAD commit and remotes from the local repository.
        #[arg(long)]
        git: bool,

        /// Jobs endpoint of the coverage service.
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Print the job JSON instead of submitting it.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("covup=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let output = match args.command {
        Commands::Parse {
            report,
            format,
            root,
        } => cli::cmd_parse(&report, format.as_deref(), root.as_deref())?,
        Commands::Upload {
            report,
            format,
            root,
            config,
            repo_token,
            service_name,
            flag_name,
            parallel,
            git,
            endpoint,
            dry_run,
        } => {
            let mut overrides = Config::new();
            if let Some(token) = repo_token {
                overrides.set("repo_token", token);
            }
            if let Some(name) = service_name {
                overrides.set("service_name", name);
            }
            if let Some(flag) = flag_name {
                overrides.set("flag_name", flag);
            }
            if parallel {
                overrides.set("parallel", "true");
            }

            let opts = UploadOptions {
                format,
                root,
                config_file: config,
                env: Config::from_env(),
                overrides,
                git,
                endpoint,
                dry_run,
            };
            cli::cmd_upload(&report, opts)?
        }
    };

    print!("{output}");
    Ok(())
}
