use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use minivsfs::{FileType, FormatOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mkfs_minivsfs", version, about = "Build and extend MiniVSFS images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a fresh image holding only the root directory.
    Format {
        #[arg(long)]
        image: PathBuf,
        /// Image size in KiB.
        #[arg(long)]
        size_kib: u64,
        /// Number of inodes, the root included.
        #[arg(long)]
        inodes: u64,
        /// Project id recorded in the root inode.
        #[arg(long, default_value_t = 0)]
        project_id: u32,
    },
    /// Copy a host file into the root directory of an image.
    Append {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        file: PathBuf,
    },
    /// List the root directory.
    Ls {
        #[arg(long)]
        image: PathBuf,
    },
    /// Check every checksum and the bitmaps against the inodes.
    Verify {
        #[arg(long)]
        image: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("minivsfs=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            let code = error
                .downcast_ref::<minivsfs::Error>()
                .map(minivsfs::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Format {
            image,
            size_kib,
            inodes,
            project_id,
        } => {
            let options = FormatOptions {
                size_kib,
                inode_count: inodes,
                project_id,
            };
            minivsfs::build_with(&image, &options)
                .with_context(|| format!("formatting {}", image.display()))?;
        }
        Command::Append { input, output, file } => {
            let report = minivsfs::append(&input, &output, &file)
                .with_context(|| format!("appending {} to {}", file.display(), input.display()))?;
            println!(
                "{}: inode {}, {} bytes in {} blocks",
                report.name,
                report.inode,
                report.size,
                report.block_count()
            );
        }
        Command::Ls { image } => {
            let fs = minivsfs::load_image(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            for entry in fs.read_dir() {
                let (kind, size) = match entry.file_type() {
                    Some(FileType::Directory) => ("dir", 0),
                    _ => ("file", fs.inodes().get(entry.inode_id)?.size),
                };
                println!("{:>5} {:<4} {:>8} {}", entry.inode_id, kind, size, entry.name_lossy());
            }
        }
        Command::Verify { image } => {
            let fs = minivsfs::load_image(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let report = fs.verify();
            if !report.is_clean() {
                for problem in &report.problems {
                    eprintln!("{}", problem);
                }
                bail!(minivsfs::Error::InvalidImage(format!(
                    "{} problem(s) found",
                    report.problems.len()
                )));
            }
            print!("{}", fs.dump());
        }
    }
    Ok(())
}
