use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use zipcodec::{CompressionMethod, ZipArchive};

/// List the contents of a ZIP archive
#[derive(Parser, Debug)]
#[command(name = "ls", long_about = None)]
struct Cli {
    /// Archive to list
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Also show method, compressed size and CRC-32
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let archive = ZipArchive::from_file(File::open(&cli.file)?)?;

    println!("Archive:  {}", cli.file.display());
    if archive.base_offset() > 0 {
        println!("Prefix:   {} bytes", archive.base_offset());
    }
    if !archive.comment().is_empty() {
        println!("Comment:  {}", String::from_utf8_lossy(archive.comment()));
    }

    println!();
    if cli.verbose {
        println!("   Length  Method     Size  CRC-32    Date/Time            Name");
        println!("---------  ------  -------  --------  -------------------  ----");
    } else {
        println!("   Length  Date/Time            Name");
        println!("---------  -------------------  ----");
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    for entry in archive.entries() {
        total_uncompressed += entry.uncompressed_size();
        total_compressed += entry.compressed_size();

        if cli.verbose {
            let method = match entry.compression_method() {
                Ok(CompressionMethod::Store) => "Stored".to_string(),
                Ok(CompressionMethod::Deflate) => "Defl:N".to_string(),
                Err(_) => format!("#{}", entry.method_id()),
            };
            println!(
                "{:9}  {:6}  {:7}  {:08x}  {:19}  {}",
                entry.uncompressed_size(),
                method,
                entry.compressed_size(),
                entry.crc32(),
                entry.last_modified(),
                entry.name()
            );
        } else {
            println!(
                "{:9}  {:19}  {}",
                entry.uncompressed_size(),
                entry.last_modified(),
                entry.name()
            );
        }
    }

    println!("---------                       ----");
    println!(
        "{:9}                       {} files",
        total_uncompressed,
        archive.entries().len()
    );

    if total_compressed > 0 && total_uncompressed > 0 {
        let compression_ratio = (total_compressed as f64 / total_uncompressed as f64) * 100.0;
        println!(
            "Compressed size: {} bytes ({:.1}%)",
            total_compressed, compression_ratio
        );
    }

    Ok(())
}
