//! montuno - piano montuno generator
//!
//! Usage:
//!   montuno render "Cmaj7 | Dm7 G7 | Cmaj7"       # write tradicional_2-3_montuno.mid
//!   montuno render --file tune.txt --template 3-2 -o tune.mid
//!   montuno plan "Am7 | (10)D7"                   # schedule and voicings as JSON
//!   montuno templates                             # list rhythm templates
//!   montuno config                                # effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use montuno_conf::MontunoConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "montuno")]
#[command(about = "Generate piano montunos from chord progressions")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ./montuno.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Arrange a progression and write it as a MIDI file
    Render {
        /// Progression text, bars separated by `|`
        progression: Option<String>,

        /// Read the progression from a file instead
        #[arg(short, long, conflicts_with = "progression")]
        file: Option<PathBuf>,

        /// Rhythm template name
        #[arg(short, long)]
        template: Option<String>,

        /// Reference MIDI file (overrides the template's)
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Harmonization before the first inline marker (octaves, double-octave, tenths, thirteenths, plain)
        #[arg(long)]
        harmonization: Option<String>,

        /// Output path (default: <reference stem>_montuno.mid next to the reference)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the schedule and voicings without rendering
    Plan {
        /// Progression text, bars separated by `|`
        progression: Option<String>,

        /// Read the progression from a file instead
        #[arg(short, long, conflicts_with = "progression")]
        file: Option<PathBuf>,

        /// Rhythm template name
        #[arg(short, long)]
        template: Option<String>,

        /// Harmonization before the first inline marker
        #[arg(long)]
        harmonization: Option<String>,
    },

    /// List configured rhythm templates
    Templates,

    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = MontunoConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.telemetry.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::Render {
            progression,
            file,
            template,
            reference,
            harmonization,
            output,
        } => commands::render(
            &config,
            commands::RenderArgs {
                progression,
                file,
                template,
                reference,
                harmonization,
                output,
            },
        ),
        Commands::Plan {
            progression,
            file,
            template,
            harmonization,
        } => commands::plan(&config, progression, file, template, harmonization),
        Commands::Templates => commands::templates(&config),
        Commands::Config => commands::show_config(&config, &sources),
    }
}
