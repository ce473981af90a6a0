//! Check the structure of a font collection; exits 1 if anything is wrong

use std::process::ExitCode;

use clap::Parser;
use fontcoll::verify::{describe, verify};
use log::info;
use ttc_roundtrip::{init_logging, tool, Error, VerifyArgs};

fn main() -> ExitCode {
    let args = VerifyArgs::parse();
    init_logging(args.verbose);
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &VerifyArgs) -> Result<bool, Error> {
    let expectations = args.expectations()?;
    let bytes = tool::read_input(&args.archive)?;
    if args.verbose {
        for summary in describe(&bytes)? {
            println!("{summary}");
        }
    }
    let report = verify(&bytes, &expectations, args.checksums);
    for finding in &report.findings {
        println!("{}: {finding}", args.archive.display());
    }
    if report.passed() {
        info!("{}: {} fonts, ok", args.archive.display(), report.members);
    }
    Ok(report.passed())
}
