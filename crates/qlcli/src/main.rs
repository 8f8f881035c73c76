//! quodlibet - compose pieces from MIDI fragments on the command line
//!
//! Subcommands:
//! - `quodlibet inspect <file>` - Decode a fragment and list its events
//! - `quodlibet compose <piece> --pick ...` - Walk a piece and export the result
//! - `quodlibet config` - Show the effective configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "quodlibet")]
#[command(about = "Compose multi-voice pieces from pre-authored MIDI fragments")]
#[command(version)]
struct Cli {
    /// Config file used instead of ./quodlibet.toml
    #[arg(short, long, global = true, env = "QUODLIBET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a format 0 fragment and print its retained events
    Inspect {
        /// Path to a .mid file
        file: PathBuf,

        /// Print the decoded document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Choose one option per slot and export the piece
    Compose {
        /// Piece directory, absolute or relative to the configured pieces_dir
        piece: PathBuf,

        /// Option index for each slot in cursor order, e.g. 0,1,0,2
        #[arg(short, long, value_delimiter = ',', required = true)]
        pick: Vec<usize>,

        /// Key signature, -7 (7 flats) to 7 (7 sharps)
        #[arg(short, long, allow_hyphen_values = true)]
        key: Option<i8>,

        /// Tempo in beats per minute
        #[arg(short, long)]
        tempo: Option<u32>,

        /// Instrument for a line's picks, as LINE:PROGRAM
        #[arg(short, long, value_parser = commands::parse_pair)]
        instrument: Vec<(usize, u8)>,

        /// Volume for a line, as LINE:VOLUME
        #[arg(long, value_parser = commands::parse_pair)]
        volume: Vec<(usize, u8)>,

        /// Take back this many picks before exporting
        #[arg(short, long, default_value = "0")]
        undo: usize,

        /// Export directory (defaults to the configured export_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print per-line note ranges as JSON after exporting
        #[arg(long)]
        spectra: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = quodconf::QuodConfig::load_with_sources_from(cli.config.as_deref())?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.telemetry.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { file, json } => commands::inspect(&file, json),
        Commands::Compose {
            piece,
            pick,
            key,
            tempo,
            instrument,
            volume,
            undo,
            out,
            spectra,
        } => commands::compose(
            &config,
            commands::ComposeArgs {
                piece,
                picks: pick,
                key,
                tempo,
                instruments: instrument,
                volumes: volume,
                undo,
                out,
                spectra,
            },
        ),
        Commands::Config => commands::show_config(&config, &sources),
    }
}
