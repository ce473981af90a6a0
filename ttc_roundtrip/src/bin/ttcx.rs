//! Extract members of font collections, or convert them to and from text

use std::process::ExitCode;

use clap::Parser;
use ttc_roundtrip::{
    init_logging,
    tool::{self, Conversion},
    Error, ToolArgs,
};

fn main() -> ExitCode {
    let args = ToolArgs::parse();
    init_logging(args.verbose);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &ToolArgs) -> Result<(), Error> {
    args.validate()?;
    let checksums = args.checksums();
    for input in &args.inputs {
        match args.font_number {
            Some(index) => {
                let out = args.output_for(input, Some(index), "ttf");
                tool::extract_member(input, index, &out, checksums)?;
            }
            None => {
                let conversion = Conversion::detect(&tool::read_input(input)?)?;
                let out = args.output_for(input, None, conversion.extension());
                tool::convert(input, &out, checksums)?;
            }
        }
    }
    Ok(())
}
