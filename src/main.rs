use anyhow::Context;
use clap::Parser;
use hybrid_pattern_matching::cluster::{LocalCluster, TcpCommunicator};
use hybrid_pattern_matching::runner::run_rank;
use hybrid_pattern_matching::{EngineConfig, PatternMatchingError, TieBreak};
use log::{debug, error};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hybrid-match")]
#[command(about = "Find the first matching pattern object in every picture, across a group of ranks")]
struct Cli {
    /// Problem file: threshold, pictures, objects
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Where the coordinator writes one result line per picture
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Ranks to run as threads of this process (ignored with --rank)
    #[arg(long, default_value_t = NonZeroUsize::MIN)]
    workers: NonZeroUsize,

    /// Rayon threads per rank for position scans
    #[arg(long)]
    threads: Option<NonZeroUsize>,

    /// Which qualifying position wins when several match
    #[arg(long, value_enum, default_value_t = TieBreak::RowMajor)]
    tie_break: TieBreak,

    /// Skip the Vulkan backend and search on the CPU only
    #[arg(long)]
    no_accelerator: bool,

    /// Enable Vulkan validation layers when installed
    #[arg(long)]
    vulkan_validation: bool,

    /// This process's rank in a TCP process group
    #[arg(long, requires_all = ["world_size", "coordinator"])]
    rank: Option<usize>,

    /// Number of ranks in the TCP process group
    #[arg(long, requires = "rank")]
    world_size: Option<usize>,

    /// Address rank 0 listens on and the other ranks connect to
    #[arg(long, value_name = "ADDR", requires = "rank")]
    coordinator: Option<String>,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            use_accelerator: !self.no_accelerator,
            tie_break: self.tie_break,
            threads: self.threads.map(NonZeroUsize::get),
            vulkan_validation: self.vulkan_validation,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<PatternMatchingError>()
                .map_or(1, PatternMatchingError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.engine_config();

    if let (Some(rank), Some(world_size), Some(addr)) = (cli.rank, cli.world_size, cli.coordinator.as_deref()) {
        let comm = TcpCommunicator::join(rank, world_size, addr)
            .with_context(|| format!("rank {rank} failed to join the group at {addr}"))?;
        run_rank(&comm, &cli.input, &cli.output, &config)?;
        return Ok(());
    }

    let results = LocalCluster::run(cli.workers.get(), |comm| {
        run_rank(&comm, &cli.input, &cli.output, &config).map(|_| ())
    });

    // Rank order puts the coordinator's own failure ahead of the aborts it caused.
    let mut failures = results
        .into_iter()
        .enumerate()
        .filter_map(|(rank, result)| result.err().map(|e| (rank, e)));
    match failures.next() {
        Some((rank, first)) => {
            for (rank, e) in failures {
                debug!("Rank {} also failed: {}", rank, e);
            }
            Err(first).with_context(|| format!("rank {rank} failed"))
        }
        None => Ok(()),
    }
}
