use anyhow::{bail, Context, Result};
use quodconf::{ConfigSources, QuodConfig};
use quodlibet::{Catalog, Composer, CompositionConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct ComposeArgs {
    pub piece: PathBuf,
    pub picks: Vec<usize>,
    pub key: Option<i8>,
    pub tempo: Option<u32>,
    pub instruments: Vec<(usize, u8)>,
    pub volumes: Vec<(usize, u8)>,
    pub undo: usize,
    pub out: Option<PathBuf>,
    pub spectra: bool,
}

/// Parse `LINE:VALUE`.
pub fn parse_pair(s: &str) -> Result<(usize, u8), String> {
    let (line, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:VALUE, got {s:?}"))?;
    let line = line
        .trim()
        .parse()
        .map_err(|e| format!("bad line index {line:?}: {e}"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value {value:?}: {e}"))?;
    Ok((line, value))
}

pub fn inspect(file: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let smf = midifile::decode(&bytes).with_context(|| format!("decoding {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&smf)?);
    } else {
        print!("{}", smf.describe());
    }
    Ok(())
}

pub fn compose(config: &QuodConfig, args: ComposeArgs) -> Result<()> {
    let piece_dir = resolve_piece(config, &args.piece);
    let catalog = Catalog::load_dir(&piece_dir)
        .with_context(|| format!("loading piece {}", piece_dir.display()))?;
    let composition = CompositionConfig::load(&piece_dir.join("composition.toml"))?;
    let mut composer = Composer::new(composition, Arc::new(catalog))?;

    if let Some(key) = args.key {
        composer.set_key_signature(key)?;
    }
    if let Some(tempo) = args.tempo {
        composer.set_tempo(tempo)?;
    }
    for (line, volume) in &args.volumes {
        composer.set_line_volume(*line, *volume)?;
    }

    for (n, index) in args.picks.iter().enumerate() {
        let (step, line) = composer.cursor();
        let options = composer.options_for_cursor();
        if options.is_empty() {
            bail!("pick {n}: the piece has ended after {} steps", composer.step_count());
        }
        let Some(choice) = options.get(*index) else {
            bail!(
                "pick {n}: step {step} line {line} has {} options, index {index} is out of range",
                options.len()
            );
        };

        let mut choice = choice.clone();
        if let Some((_, program)) = args.instruments.iter().rev().find(|(l, _)| *l == line) {
            choice.set_instrument(*program)?;
        }
        composer.apply_choice(choice)?;
    }

    for _ in 0..args.undo {
        if composer.undo_choice().is_none() {
            break;
        }
    }

    let export = composer.export()?;
    let out_dir = args.out.unwrap_or_else(|| config.paths.export_dir.clone());
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let path = out_dir.join(export.file_name());
    std::fs::write(&path, &export.bytes).with_context(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), "wrote composition");
    println!("{}", path.display());

    if args.spectra {
        println!("{}", serde_json::to_string_pretty(&composer.spectra()?)?);
    }
    Ok(())
}

fn resolve_piece(config: &QuodConfig, piece: &Path) -> PathBuf {
    if piece.is_absolute() || piece.exists() {
        piece.to_path_buf()
    } else {
        config.paths.pieces_dir.join(piece)
    }
}

pub fn show_config(config: &QuodConfig, sources: &ConfigSources) -> Result<()> {
    print!("{}", config.to_toml());

    println!();
    if sources.files.is_empty() {
        println!("# No config files found, using defaults");
    }
    for file in &sources.files {
        println!("# loaded: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# env override: {var}");
    }
    Ok(())
}
