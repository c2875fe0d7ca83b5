use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zimcluster::cluster::{read_cluster_with_options, Cluster, ClusterInfo, ClusterOptions};
use zimcluster::io::FileSource;

#[derive(Parser)]
#[command(name = "zimcluster", about = "Inspect and extract archive clusters")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Location {
    /// Archive file
    input: PathBuf,
    /// Byte offset of the cluster info byte
    #[arg(long)]
    offset: u64,
    /// End of the cluster (next cluster's offset); defaults to end of file
    #[arg(long)]
    end: Option<u64>,
    /// KiB pulled from the file per decoder read
    #[arg(long, default_value = "64")]
    read_chunk_kib: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show compression, offset width and blob sizes
    Info {
        #[command(flatten)]
        at: Location,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write one blob (or a range of it) to a file or stdout
    Extract {
        #[command(flatten)]
        at: Location,
        #[arg(short, long)]
        blob: usize,
        #[arg(long, default_value = "0")]
        range_offset: u64,
        #[arg(long)]
        range_size: Option<u64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Hex preview of every blob
    Dump {
        #[command(flatten)]
        at: Location,
        #[arg(long, default_value = "16")]
        bytes: u64,
    },
}

#[derive(Serialize)]
struct ClusterSummary {
    #[serde(flatten)]
    info:       ClusterInfo,
    blob_count: usize,
    blob_sizes: Vec<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { at, json } => {
            let cluster = open_cluster(&at)?;
            let summary = ClusterSummary {
                info:       cluster.info(),
                blob_count: cluster.blob_count(),
                blob_sizes: (0..cluster.blob_count())
                    .map(|i| cluster.blob_size(i))
                    .collect::<Result<_, _>>()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            println!("── Cluster @ {} ─────────────────────────────────────────", at.offset);
            println!("  Compression    {}", summary.info.compression);
            println!("  Extended       {}", summary.info.extended);
            println!("  Blobs          {}", summary.blob_count);
            for (i, size) in summary.blob_sizes.iter().enumerate() {
                let offset = cluster.blob_offset(i)
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".into());
                println!("    #{:<6} {:>12} B  at {}", i, size, offset);
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { at, blob, range_offset, range_size, output } => {
            let cluster = open_cluster(&at)?;
            let data = cluster.blob_range(blob, range_offset, range_size.unwrap_or(u64::MAX))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, data.data())?;
                    eprintln!("Wrote {} B to {}", data.size(), path.display());
                }
                None => std::io::stdout().lock().write_all(data.data())?,
            }
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { at, bytes } => {
            let cluster = open_cluster(&at)?;
            for i in 0..cluster.blob_count() {
                let head = cluster.blob_range(i, 0, bytes)?;
                let more = if cluster.blob_size(i)? > head.size() { "..." } else { "" };
                println!("#{:<6} {:>12} B  {}{}", i, cluster.blob_size(i)?, hex::encode(head.data()), more);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_cluster(at: &Location) -> Result<Arc<dyn Cluster>, Box<dyn std::error::Error>> {
    let source = FileSource::open(&at.input)?;
    let opts = ClusterOptions { read_chunk_size: at.read_chunk_kib.max(1) * 1024 };
    Ok(read_cluster_with_options(&source, at.offset, at.end, &opts)?)
}
