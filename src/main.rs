use clap::{CommandFactory, Parser};
use clap::error::ErrorKind as ClapErrorKind;
use log::LevelFilter;
use update_app::decoder::BlockStreamDecoder;
use update_app::sink::{CollectingSink, DirectoryStore, DumpingSink};
use update_app::source::{ContainerSource, SourceKind, DEFAULT_ENTRY_NAME};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "update-app", about = "Work with Huawei UPDATE.APP (and update.zip) files")]
struct Cli {
    /// An UPDATE.APP file, or an update.zip with an UPDATE.APP in it
    input: PathBuf,
    /// Directory the extracted modules are written to
    #[arg(short = 'C', long, default_value = ".")]
    output_dir: PathBuf,
    /// Entry to read when the input is a zip archive
    #[arg(long, default_value = DEFAULT_ENTRY_NAME)]
    entry: String,
    /// Only list the blocks; write nothing
    #[arg(short, long)]
    list: bool,
    /// With --list, print the listing as JSON
    #[arg(long, requires = "list")]
    json: bool,
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if SourceKind::from_path(&cli.input).is_none() {
        Cli::command()
            .error(
                ClapErrorKind::InvalidValue,
                format!("unrecognised file name: {} (expected .APP or .zip)", cli.input.display()),
            )
            .exit();
    }

    let mut source = ContainerSource::open_with_entry(&cli.input, &cli.entry)?;
    log::info!("parsing {}", source.describe());
    let mut decoder = BlockStreamDecoder::new(source.stream()?);

    // ── List ─────────────────────────────────────────────────────────────────
    if cli.list {
        let mut sink = CollectingSink::new();
        decoder.run(&mut sink)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&sink.blocks)?);
            return Ok(());
        }
        println!("{:<10} {:<12} {:<16} {:>12} {:<20}", "Offset", "Module id", "Name", "Size", "Built");
        for b in &sink.blocks {
            let built = b.timestamp()
                .map(|t| t.to_string())
                .unwrap_or_else(|| format!("{} {}", b.date, b.time).trim().to_owned());
            println!("{:<10} {:<12} {:<16} {:>12} {:<20}",
                format!("{:#x}", b.offset), b.module_id.to_string(), b.display_name,
                b.data_len, built);
        }
        return Ok(());
    }

    // ── Dump ─────────────────────────────────────────────────────────────────
    let mut sink = DumpingSink::new(DirectoryStore::new(&cli.output_dir));
    let summary = decoder.run(&mut sink)?;
    for (module, size) in sink.written() {
        println!("  wrote  {:<16} {:>12} B", module.file_name(), size);
    }
    println!("Extracted {} module(s) to {}", summary.blocks, cli.output_dir.display());
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
