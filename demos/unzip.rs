use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use zipcodec::{ArchiveEntry, ZipArchive};

/// Extract files from a ZIP archive
#[derive(Parser, Debug)]
#[command(name = "unzip", long_about = None)]
#[command(after_help = "Examples:\n  \
  unzip data.zip -d out        extract everything into out/\n  \
  unzip -p data.zip a.txt      write a.txt to stdout\n  \
  unzip -t data.zip            verify every entry's CRC-32")]
struct Cli {
    /// Archive to read
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Entries to extract (default: all)
    #[arg(value_name = "FILES")]
    files: Vec<String>,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    extract_dir: PathBuf,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pipe: bool,

    /// List files (short format)
    #[arg(short = 'l')]
    list: bool,

    /// Test archive files: decompress and verify without writing
    #[arg(short = 't')]
    test: bool,
}

impl Cli {
    fn is_selected(&self, entry: &ArchiveEntry) -> bool {
        self.files.is_empty() || self.files.iter().any(|name| name == entry.name())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let archive = ZipArchive::from_file(File::open(&cli.file)?)?;
    if !cli.pipe {
        println!("Archive:  {}", cli.file.display());
    }

    if cli.list {
        for entry in archive.entries().iter().filter(|e| cli.is_selected(e)) {
            println!(
                "{:9}  {}  {}",
                entry.uncompressed_size(),
                entry.last_modified(),
                entry.name()
            );
        }
        return Ok(());
    }

    if cli.test {
        let mut failures = 0;
        for entry in archive.entries().iter().filter(|e| cli.is_selected(e)) {
            let result = archive
                .open_read_stream(entry)
                .and_then(|mut reader| Ok(io::copy(&mut reader, &mut io::sink())?));
            match result {
                Ok(_) => println!("    testing: {:40} OK", entry.name()),
                Err(e) => {
                    println!("    testing: {:40} {}", entry.name(), e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            eprintln!("{} entries failed verification", failures);
            std::process::exit(1);
        }
        println!("No errors detected in {}", cli.file.display());
        return Ok(());
    }

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let mut failures = 0;
    for entry in archive.entries().iter().filter(|e| cli.is_selected(e)) {
        if cli.pipe {
            if !entry.is_dir() {
                let mut reader = archive.open_read_stream(entry)?;
                io::copy(&mut reader, &mut stdout)?;
            }
            continue;
        }

        // Stored names may be absolute or climb out with `..`
        let out_path = cli.extract_dir.join(&*entry.sanitized_name());
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            println!("   creating: {}", out_path.display());
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let result = archive.open_read_stream(entry).and_then(|mut reader| {
            let mut outfile = File::create(&out_path)?;
            io::copy(&mut reader, &mut outfile)?;
            Ok(())
        });

        match result {
            Ok(()) => println!("  inflating: {}", out_path.display()),
            Err(e) => {
                eprintln!("error: {}: {}", entry.name(), e);
                failures += 1;
            }
        }
    }

    stdout.flush()?;
    if failures > 0 {
        eprintln!("{} entries failed to extract", failures);
        std::process::exit(1);
    }

    Ok(())
}
