#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tern_state::{
    decode_state, inspect_state, lookup, EntryKind, Payload, StateSummary, SummaryEntry,
    DEFAULT_STATE_FILE_NAME,
};
use tracing_subscriber::EnvFilter;

const HEX_BYTES_PER_LINE: usize = 16;

#[derive(Parser, Debug)]
#[command(
    name = "tern-state",
    about = "Inspect, verify and dump tern state snapshots (state.bin)."
)]
struct Args {
    /// File name looked up when PATH is a snapshot directory
    #[arg(long, global = true, value_name = "NAME", default_value = DEFAULT_STATE_FILE_NAME)]
    state_file_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree with blob lengths
    Inspect {
        /// Snapshot directory or state file
        path: PathBuf,

        /// Print the summary as JSON
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },
    /// Decode the whole file and report entry counts
    Verify {
        /// Snapshot directory or state file
        path: PathBuf,

        /// Print the report as JSON
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },
    /// Print a single blob as hex
    Dump {
        /// Snapshot directory or state file
        path: PathBuf,

        /// `/`-separated keys, e.g. `cpu/regs/eax`
        key_path: String,
    },
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    path: String,
    bytes: usize,
    entries: usize,
    blob_bytes: usize,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Inspect { path, json } => {
            let (file, bytes) = read_state(&path, &args.state_file_name)?;
            let summary = inspect_state(&bytes)
                .with_context(|| format!("decode {}", file.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", render_summary(&summary));
            }
        }
        Command::Verify { path, json } => {
            let (file, bytes) = read_state(&path, &args.state_file_name)?;
            let summary = inspect_state(&bytes)
                .with_context(|| format!("verify {}", file.display()))?;
            let report = VerifyReport {
                path: file.display().to_string(),
                bytes: bytes.len(),
                entries: summary.entry_count(),
                blob_bytes: summary.blob_bytes(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "ok: {} ({} bytes, {} entries, {} blob bytes)",
                    report.path, report.bytes, report.entries, report.blob_bytes
                );
            }
        }
        Command::Dump { path, key_path } => {
            let (file, bytes) = read_state(&path, &args.state_file_name)?;
            let root =
                decode_state(&bytes).with_context(|| format!("decode {}", file.display()))?;
            match lookup(&root, &key_path) {
                None => bail!("no entry at {key_path:?} in {}", file.display()),
                Some(Payload::Object(_)) => {
                    bail!("{key_path:?} is an object; dump expects a blob")
                }
                Some(Payload::Blob(blob)) => print!("{}", hex_dump(blob)),
            }
        }
    }
    Ok(())
}

/// Accepts either a snapshot directory or the state file itself.
fn read_state(path: &Path, state_file_name: &str) -> anyhow::Result<(PathBuf, Vec<u8>)> {
    let file = if path.is_dir() {
        path.join(state_file_name)
    } else {
        path.to_path_buf()
    };
    tracing::debug!(path = %file.display(), "reading state file");
    let bytes = fs::read(&file).with_context(|| format!("read {}", file.display()))?;
    Ok((file, bytes))
}

fn render_summary(summary: &StateSummary) -> String {
    let mut out = format!(
        "magic {:#010x} version {}\n",
        summary.magic, summary.version
    );
    render_entries(&summary.root, 0, &mut out);
    out
}

fn render_entries(entries: &[SummaryEntry], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        match &entry.kind {
            EntryKind::Blob { len } => {
                out.push_str(&format!("{indent}{} [{len} bytes]\n", entry.key));
            }
            EntryKind::Object { entries } => {
                out.push_str(&format!(
                    "{indent}{}/ {{{} entries}}\n",
                    entry.key,
                    entries.len()
                ));
                render_entries(entries, depth + 1, out);
            }
        }
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(HEX_BYTES_PER_LINE)
        .enumerate()
        .map(|(line, chunk)| {
            let hex: String = chunk.iter().map(|byte| format!(" {byte:02x}")).collect();
            format!("{:08x} {hex}\n", line * HEX_BYTES_PER_LINE)
        })
        .collect()
}
