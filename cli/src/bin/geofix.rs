use clap::{Parser, Subcommand};
use cli::{OutputFormat, SchemaTarget, load_pipeline, render_analysis};
use color_eyre::eyre::Result;
use geofix::{CommandOutcome, Config, GeofixCommand, TextOutcome};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a .toml or .json configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Skip topology checks; validity is reported as unknown
    #[arg(long, global = true)]
    no_oracle: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Close unclosed polygon rings
    CloseRings {
        /// GeoJSON file to repair
        input: PathBuf,
        /// Write the result back to the input file instead of printing it
        #[arg(short, long)]
        write: bool,
    },
    /// Round coordinates to 3 decimals and drop redundant vertices
    Simplify {
        /// GeoJSON file to simplify
        input: PathBuf,
        /// Vertex reduction tolerance (defaults to the configured one)
        #[arg(short, long)]
        tolerance: Option<f64>,
        /// Write the result back to the input file instead of printing it
        #[arg(short, long)]
        write: bool,
    },
    /// Report validity for every geometry and each of its parts
    Diagnose {
        /// GeoJSON file to inspect
        input: PathBuf,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the JSON schema of the command set or the configuration file
    Schema {
        #[arg(value_enum, default_value_t = SchemaTarget::Commands)]
        target: SchemaTarget,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::CloseRings { input, write } => {
            run(&cli, GeofixCommand::CloseRings, input, *write, OutputFormat::Text).await?;
        }
        Commands::Simplify { input, tolerance, write } => {
            let command = GeofixCommand::Simplify { tolerance: *tolerance };
            run(&cli, command, input, *write, OutputFormat::Text).await?;
        }
        Commands::Diagnose { input, format } => {
            run(&cli, GeofixCommand::Diagnose, input, false, *format).await?;
        }
        Commands::Schema { target } => {
            let schema = match target {
                SchemaTarget::Commands => serde_json::to_string_pretty(&GeofixCommand::schema())?,
                SchemaTarget::Config => serde_json::to_string_pretty(&Config::schema())?,
            };
            println!("{schema}");
        }
    }

    Ok(())
}

async fn run(cli: &Cli, command: GeofixCommand, input: &Path, write: bool, format: OutputFormat) -> Result<()> {
    let pipeline = load_pipeline(cli.config.as_deref(), !cli.no_oracle)?;
    info!("{}", pipeline.info());
    info!("{}: {}", command, command.description());

    let text = tokio::fs::read_to_string(input).await?;

    match pipeline.execute(&command, &text) {
        CommandOutcome::Text(outcome) => {
            report(input, &outcome);
            if !write {
                println!("{}", outcome.text);
            } else if outcome.text != text {
                tokio::fs::write(input, &outcome.text).await?;
                info!("Wrote {:?}", input);
            } else {
                info!("{:?} already up to date", input);
            }
        }
        CommandOutcome::Analysis(trees) => match format {
            OutputFormat::Text => print!("{}", render_analysis(&trees)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trees)?),
        },
    }
    Ok(())
}

fn report(input: &Path, outcome: &TextOutcome) {
    for diagnostic in &outcome.diagnostics {
        warn!("{:?}: {}", input, diagnostic.message);
    }
    if outcome.modified {
        info!("{:?}: geometry changed", input);
    }
}
