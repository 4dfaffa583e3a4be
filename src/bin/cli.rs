//! Batch command-line front end for the strata loader.
//!
//! Drives the same load/await contract as the interactive viewer: build a
//! store from a graph file, open a viewport, wait for the window to load,
//! report a summary, and exit non-zero on any failure.
#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use strata::{
    MemoryStore, MemoryStoreBuilder, Node, Result, StrataError, ViewConfig, Viewport, GENOME_TAG,
};

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Windowed loader for layered variation graphs",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a graph file, wait for the window around a layer to become
    /// resident, and print a summary.
    Load {
        /// Graph file (N/E/H tab-separated records).
        file: PathBuf,

        /// Layer to centre the viewport on.
        #[arg(long, default_value_t = 0)]
        center: u32,

        /// Layers each chunk spans.
        #[arg(long, default_value_t = 64)]
        chunk_span: u32,

        /// Buffer layers kept resident beyond the shown range.
        #[arg(long, env = "STRATA_BUFFER", default_value_t = 300)]
        buffer: u32,

        /// Layers shown on screen.
        #[arg(long, default_value_t = 50.0)]
        shown: f64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "load failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Load {
            file,
            center,
            chunk_span,
            buffer,
            shown,
        } => {
            let store = parse_graph_file(&file, chunk_span)?;
            let config = ViewConfig {
                buffer_layers: buffer,
                shown_layers_default: shown,
                ..ViewConfig::default()
            };
            let viewport = Viewport::open(std::sync::Arc::new(store), config);
            viewport.move_to_layer(center);
            viewport.wait_until_loaded()?;

            let layers = viewport.layer_set();
            println!("graph:    {}", viewport.graph_name());
            println!("layers:   {} resident of {}", layers.len(), viewport.max_layer() + 1);
            println!("chunks:   {}", viewport.cache().chunk_count());
            println!("nodes:    {}", viewport.cache().node_count());
            println!("max row:  {}", viewport.max_row_seen());
            if !viewport.genomes().is_empty() {
                println!("genomes:  {}", viewport.genomes().join(", "));
            }
            Ok(())
        }
    }
}

/// Parse the minimal tab-separated graph format:
/// `H <key> <value>`, `N <id> <layer> <content> [genomes]`,
/// `E <from> <to>`. Lines starting with `#` are comments.
fn parse_graph_file(path: &PathBuf, chunk_span: u32) -> Result<MemoryStore> {
    let text = fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "graph".to_owned());
    let mut builder = MemoryStoreBuilder::new(name, chunk_span);

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let bad_record = |detail: &str| {
            StrataError::InvalidArgument(format!("line {}: {detail}", line_no + 1))
        };
        match fields[0] {
            "H" if fields.len() == 3 => {
                builder.header(fields[1], fields[2]);
            }
            "N" if fields.len() == 4 || fields.len() == 5 => {
                let id = fields[1].parse().map_err(|_| bad_record("bad node id"))?;
                let layer = fields[2].parse().map_err(|_| bad_record("bad layer"))?;
                let mut node = Node::new(id, layer, fields[3]);
                if let Some(genomes) = fields.get(4) {
                    node.options.insert(GENOME_TAG.to_owned(), (*genomes).to_owned());
                }
                builder.node(node)?;
            }
            "E" if fields.len() == 3 => {
                let from = fields[1].parse().map_err(|_| bad_record("bad edge source"))?;
                let to = fields[2].parse().map_err(|_| bad_record("bad edge target"))?;
                builder.edge(from, to)?;
            }
            _ => return Err(bad_record("unrecognized record")),
        }
    }
    builder.build()
}
