use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use mftdump::catalogue::Catalogue;
use mftdump::device::{enumerate_devices, Session};
use mftdump::extract::{extract_mft, ExtractSummary};
use mftdump::partition::{format_size, locate_ntfs_partitions};
use mftdump::scan::{scan_mft_copy, ScanStats};

const HELP_TEXT: &str = "Commands:\n\
    \thelp        show this text\n\
    \tprint files print the catalogued MFT records\n\
    \texit        leave the prompt\n";

#[derive(Parser)]
#[command(name = "mftdump")]
#[command(about = "Raw NTFS $MFT extraction and cataloguing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate block devices
    List,
    /// Locate NTFS partitions and copy each $MFT to a local file
    Extract {
        /// Block device or disk image to read
        device: PathBuf,
        /// Directory the MFT copies are written to
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Scan local MFT copies and browse the resulting catalogue
    Scan {
        /// MFT copy files produced by `extract`
        #[arg(required = true)]
        copies: Vec<PathBuf>,
    },
    /// Extract and scan in one go, then browse the catalogue
    Run {
        /// Block device or disk image to read
        device: PathBuf,
        /// Directory the MFT copies are written to
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Extract { device, out_dir } => {
            cmd_extract(&device, &out_dir)?;
            Ok(())
        }
        Commands::Scan { copies } => cmd_scan(&copies),
        Commands::Run { device, out_dir } => {
            let copies = cmd_extract(&device, &out_dir)?;
            cmd_scan(&copies)
        }
    }
}

fn cmd_list() -> Result<()> {
    let devices = enumerate_devices();
    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }
    for device in devices {
        println!("{}", device.display_name());
    }
    Ok(())
}

/// Extract the $MFT of every NTFS partition on the device. Returns the
/// paths of the local copies.
fn cmd_extract(device: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    println!(
        "Launching raw NTFS extraction engine for {}",
        device.display()
    );

    let mut session = Session::open(device)
        .with_context(|| format!("failed to open block device {}", device.display()))?;

    let partitions = locate_ntfs_partitions(&mut session)?;
    println!("{} NTFS partitions located.", partitions.len());

    let mut copies = Vec::new();
    for (index, entry) in &partitions {
        println!("\nExtracting MFT from partition {index}");
        if entry.is_bootable() {
            println!("\tThis is the boot partition.");
        }
        info!(
            "partition {index}: {} at sector {}",
            format_size(entry.size_bytes()),
            entry.relative_sector
        );

        let copy_path = out_dir.join(format!("mft{index}.data"));
        let file = File::create(&copy_path)
            .with_context(|| format!("failed to create {}", copy_path.display()))?;
        let mut out = BufWriter::new(file);

        let summary = extract_mft(&mut session, entry, *index, &mut out)?;
        out.flush()?;

        println!(
            "\tSize of MFT extracted from partition {index}: {} bytes",
            summary.bytes_written
        );
        write_meta_sidecar(&copy_path, &summary)?;
        copies.push(copy_path);
    }

    Ok(copies)
}

fn write_meta_sidecar(copy_path: &Path, summary: &ExtractSummary) -> Result<()> {
    let meta_path = copy_path.with_extension("meta.json");
    let mut file = File::create(&meta_path)
        .with_context(|| format!("failed to create {}", meta_path.display()))?;
    serde_json::to_writer_pretty(&mut file, summary)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Scan the given MFT copies into one catalogue, print the counters,
/// then hand the catalogue to the interactive prompt.
fn cmd_scan(copies: &[PathBuf]) -> Result<()> {
    println!("\nProcessing MFT...");

    let mut catalogue = Catalogue::new();
    let mut totals = ScanStats::default();

    for path in copies {
        let (part, stats) = scan_mft_copy(path)
            .with_context(|| format!("failed to scan {}", path.display()))?;
        catalogue.extend(part);
        totals.absorb(&stats);
    }

    println!("\n{totals}");

    prompt_loop(&catalogue, io::stdin().lock(), io::stdout())?;
    Ok(())
}

/// The interactive prompt: `help`, `print files`, `exit`.
fn prompt_loop<I: BufRead, O: Write>(
    catalogue: &Catalogue,
    input: I,
    mut output: O,
) -> io::Result<()> {
    writeln!(output, "\nWhat do you want to do?")?;
    for line in input.lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "help" => write!(output, "{HELP_TEXT}")?,
            "print files" => catalogue.print_all(&mut output)?,
            "exit" | "quit" => break,
            _ => writeln!(output, "Command not recognised, try 'help'")?,
        }
        writeln!(output, "\nWhat do you want to do?")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalogue() -> Catalogue {
        let mut cat = Catalogue::new();
        cat.append(Some("hello.txt".into()), 0x1000, 37);
        cat.append(None, 0x1000, 38);
        cat
    }

    #[test]
    fn test_prompt_print_files() {
        let input = b"print files\nexit\n";
        let mut output = Vec::new();
        prompt_loop(&sample_catalogue(), &input[..], &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("hello.txt"));
        assert!(text.contains("(unnamed)"));
    }

    #[test]
    fn test_prompt_unknown_command() {
        let input = b"frobnicate\nexit\n";
        let mut output = Vec::new();
        prompt_loop(&sample_catalogue(), &input[..], &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Command not recognised, try 'help'"));
    }

    #[test]
    fn test_prompt_help() {
        let input = b"help\nexit\n";
        let mut output = Vec::new();
        prompt_loop(&sample_catalogue(), &input[..], &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("print files"));
    }
}
