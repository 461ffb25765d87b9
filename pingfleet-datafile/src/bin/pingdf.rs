//! Management tool for viewing and repairing ping datafiles.

use clap::Parser;
use pingfleet_datafile::{Datafile, DatafileError, HEADER_LEN, RECORD_LEN};
use pingfleet_proto::latency;
use std::path::PathBuf;
use std::process::ExitCode;

const PEEK_RECORDS: usize = 10;

/// Inspect and repair pingfleet binary datafiles.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Show datafile header info.
    #[arg(short, long)]
    info: bool,
    /// Show the first few records.
    #[arg(short = 'H', long)]
    head: bool,
    /// Show the last few records.
    #[arg(short = 'T', long)]
    tail: bool,
    /// Run consistency checks on the datafile.
    #[arg(short, long)]
    verify: bool,
    /// Sort records by epoch into a fresh output datafile.
    #[arg(short, long, requires = "output")]
    sort: bool,
    /// Output file for --sort.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Ring capacity the file was created with.
    #[arg(long, default_value_t = pingfleet_datafile::DEFAULT_MAX_RECORDS)]
    max_records: u64,
    /// Path to the input datafile.
    datafile: PathBuf,
}

fn show_info(datafile: &Datafile) {
    println!("Path:        {}", datafile.path().display());
    println!("Version:     {}", datafile.version());
    println!("Offset:      {}", datafile.offset());
    println!("Records:     {}", datafile.n_records());
    println!("Capacity:    {}", datafile.max_records());
    println!("Full size:   {} bytes", datafile.file_size());
}

fn show_records(records: &[(u32, Option<f64>)]) {
    for (epoch, lat) in records {
        match lat {
            Some(seconds) => println!("{epoch}  {:.6}s", seconds),
            None => println!("{epoch}  timeout"),
        }
    }
}

fn verify(datafile: &Datafile) -> Result<bool, DatafileError> {
    let mut ok = true;
    let offset = datafile.offset();
    if offset < HEADER_LEN || offset >= datafile.file_size() {
        println!("FAIL: offset {offset} outside the data region");
        ok = false;
    } else if (offset - HEADER_LEN) % RECORD_LEN != 0 {
        println!("FAIL: offset {offset} not record-aligned");
        ok = false;
    }
    if datafile.n_records() > datafile.max_records() {
        println!(
            "FAIL: {} records exceed capacity {}",
            datafile.n_records(),
            datafile.max_records()
        );
        ok = false;
    }
    let on_disk = std::fs::metadata(datafile.path())?.len();
    if on_disk > datafile.file_size() {
        println!(
            "FAIL: file is {} bytes, larger than the ring allows ({})",
            on_disk,
            datafile.file_size()
        );
        ok = false;
    }
    let needed = HEADER_LEN + datafile.n_records() * RECORD_LEN;
    if datafile.n_records() < datafile.max_records() && on_disk < needed {
        println!("FAIL: file is {on_disk} bytes but the header claims {needed}");
        ok = false;
    }
    if ok {
        println!("OK");
    }
    Ok(ok)
}

fn sort_into(datafile: &mut Datafile, output: &PathBuf) -> Result<(), DatafileError> {
    let mut records = datafile.read_all()?;
    records.sort_by_key(|(epoch, _)| *epoch);
    let encoded: Vec<(u32, u16)> = records
        .into_iter()
        .map(|(epoch, lat)| (epoch, lat.map_or(latency::LATENCY_TIMEOUT, latency::encode_seconds)))
        .collect();
    let mut sorted = Datafile::create(output, datafile.max_records())?;
    sorted.overwrite_all(&encoded)?;
    println!("Wrote {} records to {}", encoded.len(), output.display());
    Ok(())
}

fn run(args: &Args) -> Result<bool, DatafileError> {
    let mut datafile = Datafile::open_with_max_records(&args.datafile, args.max_records)?;
    let mut ok = true;
    if args.info {
        show_info(&datafile);
    }
    if args.head {
        let records = datafile.read_all()?;
        show_records(&records[..records.len().min(PEEK_RECORDS)]);
    }
    if args.tail {
        let records = datafile.read_all()?;
        show_records(&records[records.len().saturating_sub(PEEK_RECORDS)..]);
    }
    if args.verify {
        ok = verify(&datafile)?;
    }
    if args.sort {
        let output = args.output.as_ref().expect("clap enforces --output");
        sort_into(&mut datafile, output)?;
    }
    Ok(ok)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("pingdf: {e}");
            ExitCode::FAILURE
        }
    }
}
