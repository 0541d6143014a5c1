use anyhow::Result;
use ariadne::config::{ExtractOptions, INDEX_DIR_LENGTH, MAX_FILES_PER_DIRECTORY, SINGLE_FILE_MAXSIZE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Extract Wikipedia dumps into a sharded, indexed JSONL store")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a dump into structured JSONL shards plus a title index
    Extract(ExtractArgs),
    /// Resolve a title against an extracted store and print its document
    Lookup(LookupArgs),
    /// Time the structuring transform against raw dump reading
    Benchmark(BenchmarkArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the Wikipedia dump file (.xml or .xml.bz2)
    input: PathBuf,

    /// Destination directory for the store
    #[arg(short, long)]
    output: PathBuf,

    /// Worker threads for the structuring pool (0 = one per core)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Rotation cap for a single shard file, in bytes
    #[arg(long, default_value_t = SINGLE_FILE_MAXSIZE)]
    max_shard_bytes: u64,

    /// Shard files per data directory before the directory id advances
    #[arg(long, default_value_t = MAX_FILES_PER_DIRECTORY)]
    max_files_per_dir: u32,

    /// Hex characters of the title digest used as the index shard key
    #[arg(long, default_value_t = INDEX_DIR_LENGTH)]
    dir_length: usize,
}

#[derive(Args)]
struct LookupArgs {
    /// Extracted store directory
    path: PathBuf,

    /// Page title to resolve
    title: String,

    /// Return the redirect stub itself instead of following the chain
    #[arg(long)]
    no_follow: bool,
}

#[derive(Args)]
struct BenchmarkArgs {
    /// Path to the Wikipedia dump file (.xml or .xml.bz2)
    input: PathBuf,

    /// Wall-clock budget for the benchmark
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let opts = ExtractOptions {
        workers: args.workers,
        max_shard_bytes: args.max_shard_bytes,
        max_files_per_dir: args.max_files_per_dir,
        dir_length: args.dir_length,
    };

    info!("Starting extraction pass");
    let start = Instant::now();
    let stats = ariadne::extract::run_extraction(&args.input, &args.output, &opts)?;
    let duration = start.elapsed();
    info!(
        duration_secs = duration.as_secs_f64(),
        "Extraction complete"
    );

    println!();
    println!("=== Summary ===");
    println!("Extraction time:  {:.2}s", duration.as_secs_f64());
    println!();
    println!("Pages written:    {}", stats.written());
    println!("Pages skipped:    {}", stats.skipped());
    println!("Pages failed:     {}", stats.failed());
    println!("Bytes written:    {}", stats.bytes());

    Ok(())
}

fn run_lookup(args: LookupArgs) -> Result<()> {
    let document = ariadne::lookup::resolve(&args.path, &args.title, !args.no_follow)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn run_benchmark(args: BenchmarkArgs) -> Result<()> {
    let report = ariadne::extract::run_benchmark(&args.input, args.seconds)?;

    println!();
    println!("=== Benchmark ===");
    println!("Pages structured:  {}", report.pages);
    println!("Chars processed:   {}", report.chars);
    println!("Structuring time:  {:.2}s", report.structure_secs);
    println!("Reading time:      {:.2}s", report.read_secs);
    if report.structure_secs > 0.0 {
        println!(
            "Throughput:        {:.0} chars/s",
            report.chars as f64 / report.structure_secs
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Lookup(args) => run_lookup(args),
        Commands::Benchmark(args) => run_benchmark(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
