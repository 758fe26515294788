use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use gw2dat::dat::{DatArchive, LookupKind};

#[derive(Parser)]
#[command(name = "gw2dat-cli")]
#[command(about = "Extract entries from a Guild Wars 2 .dat archive", long_about = None)]
struct Cli {
    /// MFT index of the entry to extract (a base ID by default)
    index: u32,

    /// Path to the .dat archive (defaults to $GW2DAT_PATH)
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Treat the index as a file ID instead of a base ID
    #[arg(long)]
    file_id: bool,

    /// Write the full payload to this file instead of previewing it
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let archive_path = cli
        .archive
        .or_else(|| std::env::var_os("GW2DAT_PATH").map(PathBuf::from))
        .context("no archive path given: pass --archive or set GW2DAT_PATH")?;

    let mut archive = DatArchive::open_path(&archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    println!("{:#?}", archive.header());

    let kind = if cli.file_id {
        LookupKind::FileId
    } else {
        LookupKind::BaseId
    };
    let data = archive
        .extract(cli.index, kind)
        .with_context(|| format!("failed to extract {} {}", kind.as_str(), cli.index))?;

    match cli.output {
        Some(path) => {
            std::fs::write(&path, &data)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Wrote {} bytes to {}", data.len(), path.display());
        }
        None => {
            let preview = &data[..data.len().min(128)];
            println!("Extracted data (first {} of {} bytes):", preview.len(), data.len());
            print!("{}", hex_dump(preview));
        }
    }

    Ok(())
}

/// Render bytes as offset/hex/ASCII rows, 16 bytes per row.
fn hex_dump(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        write!(out, "{:08x}  ", row * 16).unwrap();
        for col in 0..16 {
            match chunk.get(col) {
                Some(byte) => write!(out, "{byte:02x} ").unwrap(),
                None => out.push_str("   "),
            }
            if col == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        for &byte in chunk {
            out.push(if (0x20..0x7F).contains(&byte) {
                byte as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}
