// Command-line front end for the exports-trie codec.
//
// Operates on raw trie payload blobs (the LC_DYLD_EXPORTS_TRIE span,
// extracted from a binary by whatever Mach-O tooling the caller uses).

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::error::TrieError;
use crate::trie::{DyldExportsTrie, EncodeOptions, ParseMode};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Mach-O dyld exports trie codec.
#[derive(Parser, Debug)]
#[command(
    name = "dyldtrie",
    version,
    about = "Decode, inspect and rebuild LC_DYLD_EXPORTS_TRIE payloads",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stdout.
    #[arg(long = "json", global = true)]
    json_output: bool,

    /// Decode lazily, on first access (default is an eager walk).
    #[arg(long, global = true)]
    quick: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode a payload and print its export entries.
    Dump {
        /// Raw trie payload file.
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
    },

    /// Decode a payload, re-encode it and report both sizes.
    Roundtrip {
        /// Raw trie payload file.
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,

        /// Write the re-encoded payload here.
        #[arg(short = 'o', long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Keep the original byte layout when nothing changed.
        #[arg(long)]
        preserve_layout: bool,
    },

    /// Look up a single exported symbol by name.
    Lookup {
        /// Raw trie payload file.
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,

        /// Symbol name, e.g. `_main`.
        symbol: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = match &cli.command {
        Cmd::Dump { input } => cmd_dump(&cli, input),
        Cmd::Roundtrip {
            input,
            output,
            preserve_layout,
        } => cmd_roundtrip(&cli, input, output.as_deref(), *preserve_layout),
        Cmd::Lookup { input, symbol } => cmd_lookup(&cli, input, symbol),
    };

    if let Err(e) = result {
        eprintln!("dyldtrie: {e}");
        process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .try_init();
}

fn parse_mode(cli: &Cli) -> ParseMode {
    if cli.quick {
        ParseMode::Quick
    } else {
        ParseMode::Deep
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load(cli: &Cli, input: &Path) -> Result<DyldExportsTrie<'static>, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let trie = DyldExportsTrie::from_content(bytes, parse_mode(cli))?;
    Ok(trie)
}

fn cmd_dump(cli: &Cli, input: &Path) -> CliResult {
    let mut trie = load(cli, input)?;
    let exports = trie.exports()?;

    if cli.json_output {
        let entries: Vec<serde_json::Value> = exports
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.name(),
                    "kind": format!("{:?}", e.kind()),
                    "flags": e.flags().bits(),
                    "address": e.address(),
                    "reexport_library_ordinal": e.reexport_library_ordinal(),
                    "reexport_symbol_name": e.reexport_symbol_name(),
                    "stub_and_resolver": e.stub_and_resolver(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "payload_size": trie.data_size(),
                "exports": entries,
            })
        );
    } else {
        let count = exports.len();
        print!("{}", trie.show());
        if !cli.quiet {
            eprintln!("{} exports, {} payload bytes", count, trie.data_size());
        }
    }
    Ok(())
}

fn cmd_roundtrip(
    cli: &Cli,
    input: &Path,
    output: Option<&Path>,
    preserve_layout: bool,
) -> CliResult {
    let mut trie = load(cli, input)?;
    let old_size = trie.content().len();
    let before = trie.exports()?.to_vec();

    let encoded = trie.rebuild(EncodeOptions { preserve_layout })?.to_vec();

    // Sanity: the rebuilt payload must decode back to the same set.
    let mut reparsed = DyldExportsTrie::from_content(&encoded[..], ParseMode::Deep)?;
    let mut after = reparsed.exports()?.to_vec();
    let mut expected = before;
    expected.sort_by(|a, b| a.name().cmp(b.name()));
    after.sort_by(|a, b| a.name().cmp(b.name()));
    if after != expected {
        return Err(Box::new(TrieError::MalformedTrie {
            offset: 0,
            reason: "re-encoded payload does not decode to the same export set",
        }));
    }

    if let Some(path) = output {
        fs::write(path, &encoded)?;
    }

    if cli.json_output {
        println!(
            "{}",
            serde_json::json!({
                "exports": after.len(),
                "old_size": old_size,
                "new_size": encoded.len(),
            })
        );
    } else if !cli.quiet {
        println!(
            "{} exports: {} -> {} bytes",
            after.len(),
            old_size,
            encoded.len()
        );
    }
    Ok(())
}

fn cmd_lookup(cli: &Cli, input: &Path, symbol: &str) -> CliResult {
    let trie = load(cli, input)?;
    match trie.lookup(symbol)? {
        Some(info) => {
            if cli.json_output {
                println!(
                    "{}",
                    serde_json::json!({
                        "found": true,
                        "name": info.name(),
                        "kind": format!("{:?}", info.kind()),
                    })
                );
            } else {
                println!("{info}");
            }
            Ok(())
        }
        None => {
            if cli.json_output {
                println!("{}", serde_json::json!({ "found": false }));
            } else if !cli.quiet {
                eprintln!("symbol not found: {symbol}");
            }
            process::exit(2);
        }
    }
}
