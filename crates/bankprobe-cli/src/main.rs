//! bankprobe - print stream descriptors of game audio containers
//!
//! ```bash
//! # First stream of a wave bank, named from Music.xsb when it exists
//! bankprobe Music.xwb
//!
//! # Every stream, picking the second wavebank of a shared sound bank
//! bankprobe Music.xwb --all --wavebank 2
//!
//! # 3DO stream file
//! bankprobe intro.str
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bankprobe_core::{ByteView, NamedBytes, StreamDescriptor};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use xact::BankOptions;

/// Print stream descriptors of game audio containers as JSON
#[derive(Parser)]
#[command(name = "bankprobe")]
#[command(version)]
struct Cli {
    /// Container file (.xwb or .str)
    file: PathBuf,

    /// Stream to resolve (1-based; 0 is the first stream)
    #[arg(short, long, default_value_t = 0)]
    stream: u32,

    /// Resolve every stream in a bank
    #[arg(long, conflicts_with = "stream")]
    all: bool,

    /// Wavebank inside the sound bank to take names from (1-based)
    #[arg(short, long)]
    wavebank: Option<u8>,

    /// First sound record to consider for names (1-based)
    #[arg(long)]
    start_sound: Option<u32>,

    /// Skip the companion .xsb lookup
    #[arg(long)]
    no_names: bool,

    /// Log parser decisions
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Probe<'a> {
    file: &'a str,
    stream: u32,
    duration_secs: f64,
    #[serde(flatten)]
    descriptor: StreamDescriptor,
}

impl<'a> Probe<'a> {
    fn new(file: &'a str, stream: u32, descriptor: StreamDescriptor) -> Self {
        Self {
            file,
            stream,
            duration_secs: descriptor.duration_secs(),
            descriptor,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let file_name = cli.file.display().to_string();
    let data = fs::read(&cli.file).with_context(|| format!("failed to read {file_name}"))?;
    let container = NamedBytes::new(file_name.clone(), data);

    let probes = if is_stream_file(&cli.file) {
        let descriptor = strctrl::resolve_chunked(&container)
            .with_context(|| format!("failed to resolve {file_name}"))?;
        vec![Probe::new(&file_name, 1, descriptor)]
    } else {
        probe_bank(&cli, &container, &file_name)?
    };

    let json = if cli.all {
        serde_json::to_string_pretty(&probes)?
    } else {
        match probes.first() {
            Some(probe) => serde_json::to_string_pretty(probe)?,
            None => bail!("{file_name} has no streams"),
        }
    };
    println!("{json}");
    Ok(())
}

fn is_stream_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("str"))
}

fn probe_bank<'a>(cli: &Cli, container: &NamedBytes, file_name: &'a str) -> Result<Vec<Probe<'a>>> {
    let options = BankOptions {
        wavebank: cli.wavebank,
        start_sound: cli.start_sound,
        ..BankOptions::default()
    };

    let index_file = if cli.no_names {
        None
    } else {
        read_companion(&cli.file)?
    };
    let index_view = index_file.as_ref().map(|v| v as &dyn ByteView);

    let resolve = |target| {
        xact::resolve_bank_with(container, target, index_view, &options)
            .with_context(|| format!("failed to resolve stream {target} of {file_name}"))
    };

    let first_target = if cli.all || cli.stream == 0 { 1 } else { cli.stream };
    let first = resolve(first_target)?;
    let count = first.stream_count;
    let mut probes = vec![Probe::new(file_name, first_target, first)];

    if cli.all {
        for target in 2..=count {
            probes.push(Probe::new(file_name, target, resolve(target)?));
        }
    }
    Ok(probes)
}

/// The sound bank next to a wave bank, if there is one.
fn read_companion(bank_path: &Path) -> Result<Option<NamedBytes>> {
    let path = xact::companion_path(bank_path);
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no companion sound bank");
        return Ok(None);
    }
    let data = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Some(NamedBytes::new(path.display().to_string(), data)))
}
