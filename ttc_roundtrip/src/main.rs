use std::process::ExitCode;

use clap::Parser;
use log::warn;
use ttc_roundtrip::{init_logging, Args, Error};

/// a stage failed
const EXIT_FAILED: u8 = 1;
/// completed, but the text changed and `--deny-mismatch` is set
const EXIT_MISMATCH: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, Error> {
    let report = args.pipeline()?.run(&args.archive)?;
    report.print_summary();
    if let Some(out) = &args.out_path {
        report.write_json(out)?;
    }
    if args.deny_mismatch && !report.diagnostic.is_identical() {
        warn!("--deny-mismatch is set and the round trip changed the text");
        return Ok(ExitCode::from(EXIT_MISMATCH));
    }
    Ok(ExitCode::SUCCESS)
}
