use clap::{Parser, Subcommand};
use std::path::PathBuf;

use b2extract::extract::{ExtractOptions, Extractor, LogLevel, Severity};
use b2extract::index::IndexFile;

#[derive(Parser)]
#[command(name = "b2extract", version = "1.0.0", about = "The .b2index/.b2container extractor CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract an archive into an output directory
    Extract {
        /// Path to the .b2index file (containers are found next to it)
        index: PathBuf,
        #[arg(short, long, default_value = "extracted")]
        output: PathBuf,
        /// Load options from a JSON file first; flags below override it
        #[arg(long)]
        options: Option<PathBuf>,
        /// Explicit path to the Oodle shared library
        #[arg(long)]
        oodle: Option<PathBuf>,
        /// Emit only asset/map/bulk families (implies every other skip)
        #[arg(long)]
        only_assets: bool,
        /// Skip outputs under Wwise audio folders and localized content
        #[arg(long)]
        skip_wem: bool,
        /// Skip .bik/.bk2 videos
        #[arg(long)]
        skip_bink: bool,
        /// Pre-scan the output tree and skip entries already extracted
        #[arg(long)]
        skip_existing: bool,
        /// Skip .res/.ace entries
        #[arg(long)]
        skip_res_ace: bool,
        /// Skip configuration files (.ini, .json, .xml, ...)
        #[arg(long)]
        skip_configs: bool,
        /// Disable header-based path recovery
        #[arg(long)]
        no_header_path: bool,
        /// Disable content-scan path recovery
        #[arg(long)]
        no_content_path: bool,
        /// Log level: full, warnings, error, minimal, silent, none
        #[arg(long, default_value = "full")]
        log_level: String,
        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the entries an index describes
    List {
        index: PathBuf,
    },
    /// Show index metadata
    Info {
        index: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract {
            index, output, options, oodle,
            only_assets, skip_wem, skip_bink, skip_existing, skip_res_ace,
            skip_configs, no_header_path, no_content_path, log_level, report,
        } => {
            let mut opts: ExtractOptions = match options {
                Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
                None => ExtractOptions::default(),
            };
            opts.output_directory = output;
            opts.only_assets |= only_assets;
            opts.skip_wem_files |= skip_wem;
            opts.skip_bink_files |= skip_bink;
            opts.skip_existing_files |= skip_existing;
            opts.skip_res_and_ace |= skip_res_ace;
            opts.skip_config_files |= skip_configs;
            if no_header_path {
                opts.enable_header_path = false;
            }
            if no_content_path {
                opts.enable_content_path = false;
            }
            opts.log_level = LogLevel::from_name(&log_level).unwrap_or_else(|| {
                eprintln!("Unknown log level '{log_level}', defaulting to full");
                LogLevel::Full
            });

            let level = opts.log_level;
            let codec = b2extract::Oodle::load(oodle.as_deref());
            let mut extractor = Extractor::with_codec(opts, Box::new(codec))
                .on_log(move |msg| {
                    if level.allows(Severity::of(msg)) {
                        eprintln!("{msg}");
                    }
                })
                .on_progress(|pct| {
                    eprint!("\r{pct:6.2}%");
                    if pct >= 100.0 {
                        eprintln!();
                    }
                });

            let run = extractor.run(&index)?;
            println!("{}", run.summary());

            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_vec_pretty(&run)?)?;
                println!("Report written to {}", path.display());
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { index } => {
            let idx = IndexFile::open(&index)?;
            let records = idx.read_names();
            println!("Index: {}", index.display());
            println!("{:<10} {:>6}  Name", "Entry", "Kind");
            for r in &records {
                let kind = if r.is_directory() { "dir" } else { "file" };
                println!("{:<10} {:>6}  {}", r.file_number, kind, r.name);
            }
            println!("{} record(s)", records.len());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { index } => {
            let idx = IndexFile::open(&index)?;
            let records = idx.read_names();
            let files = records.iter().filter(|r| !r.is_directory()).count();
            let file_size = std::fs::metadata(&index)?.len();

            println!("── .b2index ─────────────────────────────────────────────");
            println!("  Path             {}", index.display());
            println!("  File size        {} B", file_size);
            println!("  Entry table      @ {}", idx.entry_table_offset);
            println!("  Names section    @ {}", idx.names_section_offset);
            println!("  Entry count hint {}", idx.entry_count_hint);
            println!("  Name count hint  {}", idx.name_count_hint);
            println!("  Records walked   {} ({} file(s), {} dir(s))",
                records.len(), files, records.len() - files);
        }
    }

    Ok(())
}
