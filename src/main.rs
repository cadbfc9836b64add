use std::{
    fs,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    thread,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mpcomp::{
    rom::{self, Archive},
    table::Table,
    texts, Decoder, Encoder,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Write every token to stderr while compressing or decompressing
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompress a Mario Party file
    Decompress {
        /// Compressed input file
        input: PathBuf,
        /// Decompressed output file
        output: PathBuf,
    },
    /// Compress a file for Mario Party
    Compress {
        /// Uncompressed input file
        input: PathBuf,
        /// Compressed output file
        output: PathBuf,
    },
    /// Extract every sub-file of the ROM archive into a directory
    Extract {
        rom: PathBuf,
        output: PathBuf,
        /// Decompress the sub-files that hold compressed data
        #[arg(short, long)]
        decompress: bool,
    },
    /// Decompress and recompress all compressed data in a ROM, and report the
    /// compression ratio and any errors
    Benchmark {
        /// The ROM must not be byte-swapped
        rom: PathBuf,
        /// Number of worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Dump the text banks of a ROM into one text file per language
    TextsExtract {
        rom: PathBuf,
        table: PathBuf,
        output: PathBuf,
    },
    /// Rebuild the text banks of a ROM from one text file per language
    TextsInsert {
        input: PathBuf,
        rom: PathBuf,
        table: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decompress { input, output } => decompress_file(&input, &output, cli.verbose),
        Commands::Compress { input, output } => compress_file(&input, &output, cli.verbose),
        Commands::Extract {
            rom,
            output,
            decompress,
        } => extract(&rom, &output, decompress),
        Commands::Benchmark { rom, jobs } => benchmark(&rom, jobs),
        Commands::TextsExtract { rom, table, output } => texts_extract(&rom, &table, &output),
        Commands::TextsInsert { input, rom, table } => texts_insert(&input, &rom, &table),
    }
}

fn decompress_file(input: &Path, output: &Path, verbose: bool) -> Result<()> {
    let mut stderr = io::stderr();
    let mut decoder = Decoder::for_file(input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;
    if verbose {
        decoder.with_logging(&mut stderr);
    }

    let data = decoder
        .decode()
        .with_context(|| format!("Failed to decompress {}", input.display()))?;
    fs::write(output, data)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    println!("Decompression process finished successfully.");
    Ok(())
}

fn compress_file(input: &Path, output: &Path, verbose: bool) -> Result<()> {
    let mut stderr = io::stderr();
    let mut encoder = Encoder::for_file(input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;
    if verbose {
        encoder.with_logging(&mut stderr);
    }

    encoder
        .encode_to_file(output)
        .with_context(|| format!("Failed to compress {}", input.display()))?;

    println!("Compression process finished successfully.");
    Ok(())
}

fn read_rom(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read ROM: {}", path.display()))
}

fn extract(rom_path: &Path, output: &Path, decompress: bool) -> Result<()> {
    let rom = read_rom(rom_path)?;
    let archive = Archive::open(&rom)?;

    for entry in archive.entries()? {
        let extracted = rom::extract_entry(entry, decompress);
        let path = output.join(entry.relative_path());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        fs::write(&path, &extracted.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        match extracted.raw_reason {
            None => println!("0x{:08X}: Done!", entry.position),
            Some(err) => println!(
                "0x{:08X}: Not valid compressed data ({}). Extracted as is.",
                entry.position, err
            ),
        }
    }

    println!("\nProcess finished!");
    Ok(())
}

fn benchmark(rom_path: &Path, jobs: Option<usize>) -> Result<()> {
    let rom = read_rom(rom_path)?;
    let archive = Archive::open(&rom)?;
    let entries = archive.entries()?;

    let workers = jobs
        .or_else(|| thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1);
    let report = rom::benchmark(&entries, workers);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for entry in &report.entries {
        match &entry.ratio {
            Ok(ratio) => writeln!(out, "0x{:08X}: Done! Compression ratio: {}", entry.position, ratio)?,
            Err(err) => writeln!(out, "0x{:08X}: {}", entry.position, err)?,
        }
    }

    writeln!(
        out,
        "\nProcess finished! {} entries round tripped, {} failed.",
        report.processed(),
        report.failed()
    )?;
    if let Some(ratio) = report.average_ratio() {
        writeln!(out, "Compression ratio average: {}", ratio)?;
    }
    writeln!(out, "Elapsed time: {}ms.", report.elapsed.as_millis())?;

    Ok(())
}

fn texts_extract(rom_path: &Path, table_path: &Path, output: &Path) -> Result<()> {
    let rom = read_rom(rom_path)?;
    let archive = Archive::open(&rom)?;
    let table = Table::from_file(table_path)
        .with_context(|| format!("Failed to load table: {}", table_path.display()))?;

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create directory: {}", output.display()))?;

    for (l, language) in archive.info().languages.iter().enumerate() {
        let lines = texts::extract_texts(&rom, language, &table)
            .with_context(|| format!("Failed to read {} texts", language.name))?;

        let path = output.join(format!("{}-{}.txt", l, language.name));
        let mut out = BufWriter::new(
            fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        );
        for line in &lines {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        println!("{}: {} texts written to {}", language.name, lines.len(), path.display());
    }

    Ok(())
}

fn texts_insert(input: &Path, rom_path: &Path, table_path: &Path) -> Result<()> {
    let mut rom = read_rom(rom_path)?;
    let info = rom::identify(&rom)?;
    let table = Table::from_file(table_path)
        .with_context(|| format!("Failed to load table: {}", table_path.display()))?;

    let mut files: Vec<PathBuf> = fs::read_dir(input)
        .with_context(|| format!("Failed to read directory: {}", input.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "txt"))
        .collect();
    files.sort();

    if files.len() != info.languages.len() {
        bail!(
            "Found {} text files, but the {} ROM has {} languages",
            files.len(),
            info.region_name,
            info.languages.len()
        );
    }

    for (file, language) in files.iter().zip(info.languages) {
        let reader = BufReader::new(
            fs::File::open(file).with_context(|| format!("Failed to open {}", file.display()))?,
        );
        let lines = reader.lines().collect::<io::Result<Vec<String>>>()?;

        texts::insert_texts(&mut rom, info, language, lines.as_slice(), &table)
            .with_context(|| format!("Failed to insert {}", file.display()))?;
        println!("{}: inserted {}", language.name, file.display());
    }

    fs::write(rom_path, &rom)
        .with_context(|| format!("Failed to write ROM: {}", rom_path.display()))?;
    Ok(())
}
