use clap::Parser;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zipcodec::{CompressionMethod, ZipArchiveWriter, ZipDateTime, ZipSink};

/// Create a ZIP archive from the specified files and directories
#[derive(Parser, Debug)]
#[command(name = "zip", long_about = None)]
struct Cli {
    /// Archive to create
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Files and directories to add. Directory contents are stored relative
    /// to the directory.
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Store files without compression
    #[arg(short = '0', long)]
    store: bool,

    /// Deflate level, 0 (fastest) through 9 (smallest)
    #[arg(short, long, default_value_t = 6)]
    level: u32,

    /// Archive comment
    #[arg(short = 'z', long)]
    comment: Option<String>,

    /// Write data descriptors instead of seeking back to patch headers
    #[arg(long)]
    streaming: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let method = if cli.store {
        CompressionMethod::Store
    } else {
        CompressionMethod::Deflate
    };
    let builder = ZipArchiveWriter::builder()
        .compression_level(cli.level)
        .default_method(method)
        .comment(cli.comment.clone().unwrap_or_default());

    let output = File::create(&cli.output)?;
    if cli.streaming {
        let mut archive = builder.build(BufWriter::new(output));
        add_inputs(&mut archive, &cli.inputs)?;
        archive.finish()?.flush()?;
    } else {
        let mut archive = builder.build_seekable(output)?;
        add_inputs(&mut archive, &cli.inputs)?;
        archive.finish()?;
    }

    println!("Successfully created '{}'", cli.output.display());
    Ok(())
}

fn add_inputs<S: ZipSink>(
    archive: &mut ZipArchiveWriter<S>,
    inputs: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    for path in inputs {
        if path.is_file() {
            let Some(name) = path.file_name().and_then(|x| x.to_str()) else {
                eprintln!("Warning: '{}' has no usable file name", path.display());
                continue;
            };
            add_file(archive, path, name)?;
        } else if path.is_dir() {
            add_directory(archive, path, "")?;
        } else {
            eprintln!(
                "Warning: '{}' does not exist or is not a regular file/directory",
                path.display()
            );
        }
    }

    Ok(())
}

fn modification_time(metadata: &fs::Metadata) -> ZipDateTime {
    metadata
        .modified()
        .map(ZipDateTime::from_system_time)
        .unwrap_or_default()
}

fn add_file<S: ZipSink>(
    archive: &mut ZipArchiveWriter<S>,
    file_path: &Path,
    archive_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = fs::metadata(file_path)?;
    let method = archive.default_method();
    let handle = archive.add_entry(archive_path, modification_time(&metadata), method)?;

    let mut input = File::open(file_path)?;
    let mut stream = handle.open_write_stream(archive)?;
    std::io::copy(&mut input, &mut stream)?;
    let entry = stream.close()?;

    println!(
        "  adding: {} ({} -> {} bytes)",
        archive_path,
        entry.uncompressed_size(),
        entry.compressed_size()
    );
    Ok(())
}

fn add_directory<S: ZipSink>(
    archive: &mut ZipArchiveWriter<S>,
    dir_path: &Path,
    base_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut entries = fs::read_dir(dir_path)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            eprintln!("Warning: skipping non UTF-8 name '{}'", path.display());
            continue;
        };

        let archive_path = if base_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", base_path, name)
        };

        if path.is_file() {
            add_file(archive, &path, &archive_path)?;
        } else if path.is_dir() {
            let metadata = fs::metadata(&path)?;
            archive.add_directory(&archive_path, modification_time(&metadata))?;
            println!("  adding: {}/", archive_path);

            add_directory(archive, &path, &archive_path)?;
        }
    }

    Ok(())
}
