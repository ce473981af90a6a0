//! Command line arguments

use std::path::{Path, PathBuf};

use clap::Parser;
use fontcoll::{extract::output_path, ChecksumPolicy};

use crate::{config::Backend, Config, Error, Pipeline};

/// Round-trip a font collection through its text form, checking each step.
#[derive(Clone, Debug, PartialEq, Parser)]
#[command(name = "ttc-roundtrip")]
pub struct Args {
    /// The collection (.ttc) to round-trip
    pub archive: PathBuf,

    /// A YAML config; command line flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run stages in this process ('builtin') or as child processes ('external')
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Extract/convert command for the external backend, split on whitespace
    #[arg(long)]
    pub tool: Option<String>,

    /// Verification command for the external backend, split on whitespace
    #[arg(long)]
    pub verifier: Option<String>,

    /// Number of members to extract, instead of reading it from the archive
    #[arg(long)]
    pub members: Option<usize>,

    /// Where to create the per-run scratch directory. Stale artifacts of
    /// older runs are swept from here first.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Leave the scratch directory in place after the run
    #[arg(long)]
    pub keep_scratch: bool,

    /// Exit with status 2 if the text changes across the round trip
    #[arg(long)]
    pub deny_mismatch: bool,

    /// Optional path to write the run report (as json)
    #[arg(short = 'o', long = "out")]
    pub out_path: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The config file, if any, with command line overrides applied.
    pub fn config(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(tool) = &self.tool {
            config.tool = split_command(tool);
        }
        if let Some(verifier) = &self.verifier {
            config.verifier = split_command(verifier);
        }
        if self.members.is_some() {
            config.member_count = self.members;
        }
        Ok(config)
    }

    pub fn pipeline(&self) -> Result<Pipeline, Error> {
        let config = self.config()?;
        Ok(Pipeline::new(config.runner()?)
            .with_member_count(config.member_count)
            .with_scratch_root(self.scratch_dir.clone())
            .keep_scratch(self.keep_scratch))
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Extract members of font collections, or convert them to and from text.
#[derive(Clone, Debug, PartialEq, Parser)]
#[command(name = "ttcx")]
pub struct ToolArgs {
    /// .ttc collections, or their text dumps
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Extract this member as a standalone font
    #[arg(short = 'y', long = "font-number")]
    pub font_number: Option<usize>,

    /// Treat checksum mismatches as errors
    #[arg(short = 'e', long)]
    pub strict: bool,

    /// What to do about checksum mismatches when not strict
    #[arg(long, default_value_t)]
    pub checksums: ChecksumPolicy,

    /// Output file; by default derived from the input name. Only for a single input.
    #[arg(short = 'o', long = "out", conflicts_with = "output_dir")]
    pub out_path: Option<PathBuf>,

    /// Directory for outputs named after their inputs
    #[arg(short = 'd', long)]
    pub output_dir: Option<PathBuf>,

    /// Overwrite an existing output file instead of picking a new name
    #[arg(short, long)]
    pub force: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

impl ToolArgs {
    /// An explicit output file only makes sense for one input.
    pub fn validate(&self) -> Result<(), Error> {
        if self.out_path.is_some() && self.inputs.len() > 1 {
            return Err(Error::OutForManyInputs(self.inputs.len()));
        }
        Ok(())
    }

    /// Where the output for `input` goes: `-o`, or a name derived from the input.
    pub fn output_for(&self, input: &Path, index: Option<usize>, ext: &str) -> PathBuf {
        match &self.out_path {
            Some(out) => out.clone(),
            None => output_path(input, self.output_dir.as_deref(), index, ext, self.force),
        }
    }

    pub fn checksums(&self) -> ChecksumPolicy {
        if self.strict {
            ChecksumPolicy::Error
        } else {
            self.checksums
        }
    }
}

/// Check the structure of a font collection.
#[derive(Clone, Debug, PartialEq, Parser)]
#[command(name = "ttc-verify")]
pub struct VerifyArgs {
    pub archive: PathBuf,

    /// A YAML config; its `expectations` are used
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Required OS/2 version of every member
    #[arg(long)]
    pub os2_version: Option<u16>,

    /// Required number of members
    #[arg(long)]
    pub members: Option<usize>,

    /// What to do about table checksum mismatches; 'error' fails verification
    #[arg(long, default_value_t)]
    pub checksums: ChecksumPolicy,

    /// Also print a summary of each member
    #[arg(short, long)]
    pub verbose: bool,
}

impl VerifyArgs {
    pub fn expectations(&self) -> Result<fontcoll::verify::Expectations, Error> {
        let mut expectations = match &self.config {
            Some(path) => Config::load(path)?.expectations,
            None => Default::default(),
        };
        if self.os2_version.is_some() {
            expectations.os2_version = self.os2_version;
        }
        if self.members.is_some() {
            expectations.member_count = self.members;
        }
        Ok(expectations)
    }
}
