use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;

#[derive(Parser)]
#[command(name = "dbt")]
#[command(about = "Summarize, fix, plan and implement code with a local generation model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Run every oracle call but write no files")]
    dry_run: bool,

    #[arg(long, global = true, help = "Use this model for one run and skip model selection")]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Summarize a file or a directory and save the report to summarize.txt")]
    Summarize {
        #[arg(help = "File or directory to summarize")]
        path: PathBuf,
    },

    #[command(about = "Fix a file in place, whole or around one line")]
    Fix {
        #[arg(help = "File to fix")]
        file: PathBuf,

        #[arg(long, help = "Approximate line of the problem (1-based, 0 for the whole file)")]
        line: Option<usize>,

        #[arg(long, help = "Description of the problem")]
        description: Option<String>,

        #[arg(long = "with", value_name = "PATH", help = "Related file or directory to show the model")]
        with: Option<PathBuf>,
    },

    #[command(about = "Generate requirements.txt from an idea file, then optionally implement it")]
    Create {
        #[arg(help = "Text file describing the idea")]
        idea: PathBuf,

        #[arg(help = "Directory to create the project in")]
        target: PathBuf,

        #[arg(long, short = 'y', help = "Continue into implementation without asking")]
        yes: bool,
    },

    #[command(about = "Implement requirements or source code into a target project")]
    Implement {
        #[arg(help = "Requirements file or source directory")]
        source: PathBuf,

        #[arg(help = "Existing target project directory")]
        target: PathBuf,

        #[arg(long, help = "Generate every file in one response instead of following a plan")]
        single_shot: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "dbt=debug" } else { "dbt=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
        model_override: cli.model,
    };

    match cli.command {
        Commands::Summarize { path } => {
            cli::summarize(path, &config).await?;
        }
        Commands::Fix {
            file,
            line,
            description,
            with,
        } => {
            let args = cli::FixArgs {
                file,
                line,
                description,
                with,
            };
            cli::fix(args, &config).await?;
        }
        Commands::Create { idea, target, yes } => {
            cli::create(idea, target, yes, &config).await?;
        }
        Commands::Implement {
            source,
            target,
            single_shot,
        } => {
            cli::implement(source, target, single_shot, &config).await?;
        }
    }

    Ok(())
}
