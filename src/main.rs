// Chopshop command line
// Chops an audio file into representative clips and writes them to a directory

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chopshop::state::write_run;
use chopshop::{
    load_config, ChopEngine, ChopInput, ChopParams, EngineConfig, TraceEntry, TraceWriter,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "chopshop",
    version,
    about = "Cut a recording into clustered, representative chops"
)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log per-stage detail
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chop an audio file (WAV, MP3, FLAC, OGG, M4A)
    Chop {
        input: PathBuf,

        /// Output directory (defaults to <input stem>_chops next to the input)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Target segment length in seconds
        #[arg(long, default_value_t = ChopParams::default().default_length)]
        default_length: f64,

        /// Shortest allowed segment in seconds
        #[arg(long, default_value_t = ChopParams::default().min_duration)]
        min_duration: f64,

        /// Number of clusters to group segments into
        #[arg(long, default_value_t = ChopParams::default().n_clusters)]
        n_clusters: usize,

        /// Maximum number of chops to write
        #[arg(long, default_value_t = ChopParams::default().max_chops)]
        max_chops: usize,

        /// Engine configuration JSON (see show-config)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the default engine configuration as JSON
    ShowConfig,
    /// Check an engine configuration file
    ValidateConfig { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chop {
            input,
            output,
            default_length,
            min_duration,
            n_clusters,
            max_chops,
            config,
        } => {
            let params = ChopParams::new(default_length, min_duration, n_clusters, max_chops);
            run_chop(&input, output, params, config)
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&EngineConfig::default())?);
            Ok(())
        }
        Commands::ValidateConfig { file } => {
            load_config(&file)
                .with_context(|| format!("invalid configuration {}", file.display()))?;
            println!("{} is valid", file.display());
            Ok(())
        }
    }
}

fn run_chop(
    input: &Path,
    output: Option<PathBuf>,
    params: ChopParams,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = match config {
        Some(path) => load_config(&path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = ChopEngine::new(config)?;

    let data = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let hint = input.extension().and_then(|e| e.to_str());

    let mut trace: Vec<TraceEntry> = Vec::new();
    let report = engine
        .chop_traced(
            ChopInput::Bytes {
                data: &data,
                format_hint: hint,
            },
            &params,
            &mut trace,
        )
        .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;

    let out_dir = output.unwrap_or_else(|| default_output_dir(input));
    let stored = write_run(&out_dir, &report)
        .with_context(|| format!("failed to write chops to {}", out_dir.display()))?;

    TraceWriter::new(out_dir.join("trace.jsonl"))
        .write_batch(&trace)
        .context("failed to write trace")?;

    let meta = &report.metadata;
    println!(
        "{} chops from {} segments ({} onsets, {} clusters) -> {}",
        meta.chops_returned,
        meta.segments_before_filtering,
        meta.onsets_detected,
        meta.clusters_used,
        out_dir.display()
    );
    for (chop, file) in report.chops.iter().zip(&stored) {
        println!(
            "  {}  {:>7.3}s - {:>7.3}s  cluster {}  {}  {}",
            chop.name,
            chop.start,
            chop.end,
            chop.cluster_label,
            chop.descriptor,
            &file.sha256[..12]
        );
    }

    Ok(())
}

/// `<dir>/<stem>_chops` next to the input file
fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}_chops", stem))
}
