#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use rpc_tnp::efficiency_cmd::GroupBy;
use rpc_tnp::{efficiency_cmd, flatten_cmd, merge_cmd};

#[derive(Parser, Debug)]
#[command(name = "rpc-tnp")]
#[command(about = "Flatten and merge RPC tag-and-probe NanoAOD data", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set RPC_TNP_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Flatten a NanoAOD file into hit/muon tables and efficiency histograms
    Flatten {
        /// Input NanoAOD file
        #[arg(short = 'i', long)]
        input_path: PathBuf,
        /// Golden JSON file
        #[arg(short = 'c', long)]
        cert_path: PathBuf,
        /// CSV file containing RPC roll information
        #[arg(short = 'g', long)]
        geom_path: PathBuf,
        /// Output file name
        #[arg(short = 'o', long, default_value = "output.json")]
        output_path: PathBuf,
        /// Branch prefix [default: rpcTnP]
        #[arg(short = 'n', long)]
        name: Option<String>,
        /// Tree holding the events [default: Events]
        #[arg(long)]
        tree: Option<String>,
        /// Roll mask file (JSON array of roll names)
        #[arg(long)]
        roll_mask_path: Option<PathBuf>,
        /// Run mask file (JSON array of run numbers)
        #[arg(long)]
        run_mask_path: Option<PathBuf>,
        /// Flatten settings (.toml, .yaml or .yml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Merge flat files into one
    Merge {
        /// Input flat file paths
        #[arg(short = 'i', long, num_args = 1.., required = true)]
        input_paths: Vec<PathBuf>,
        /// Output file path
        #[arg(short = 'o', long)]
        output_path: PathBuf,
    },

    /// Write per-roll or per-run efficiencies of a flat file as CSV
    Efficiency {
        /// Input flat file
        #[arg(short = 'i', long)]
        input_path: PathBuf,
        /// Group bins by roll or by run
        #[arg(long, value_enum, default_value_t = GroupBy::Roll)]
        by: GroupBy,
        /// CSV output path (stdout when omitted)
        #[arg(short = 'o', long)]
        output_path: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("RPC_TNP_LOG").unwrap_or_else(|_| {
        if verbose { "rpc_tnp=debug".to_string() } else { "rpc_tnp=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Flatten {
            input_path,
            cert_path,
            geom_path,
            output_path,
            name,
            tree,
            roll_mask_path,
            run_mask_path,
            config,
        } => flatten_cmd::run(
            input_path,
            cert_path,
            geom_path,
            output_path,
            config,
            name,
            tree,
            roll_mask_path,
            run_mask_path,
        ),
        Commands::Merge { input_paths, output_path } => merge_cmd::run(input_paths, output_path),
        Commands::Efficiency { input_path, by, output_path } => efficiency_cmd::run(input_path, by, output_path),
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
