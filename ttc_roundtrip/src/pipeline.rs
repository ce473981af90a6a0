//! The round trip, one stage after another

use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use fontcoll::read_header;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::StageError,
    report::{compare_text, Diagnostic, PipelineReport, StageRecord},
    runner::StageRunner,
    scratch::{sweep, Artifact, Scratch},
    Error,
};

/// The steps of a round trip, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Extract every member of the original archive
    Extract0,
    Verify0,
    /// Original archive to text
    Convert0,
    /// Text back to an archive
    RoundTrip,
    VerifyRoundTrip,
    /// Extract every member of the round-tripped archive
    Extract1,
    /// Round-tripped archive to text
    Convert1,
    /// Compare the two texts
    Diff,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Extract0,
        Stage::Verify0,
        Stage::Convert0,
        Stage::RoundTrip,
        Stage::VerifyRoundTrip,
        Stage::Extract1,
        Stage::Convert1,
        Stage::Diff,
    ];

    fn banner(&self) -> &'static str {
        match self {
            Stage::Extract0 => "Extracting members of the original archive",
            Stage::Verify0 => "Verifying the original archive",
            Stage::Convert0 => "Converting the original archive to text",
            Stage::RoundTrip => "Converting the text back to an archive",
            Stage::VerifyRoundTrip => "Verifying the round-tripped archive",
            Stage::Extract1 => "Extracting members of the round-tripped archive",
            Stage::Convert1 => "Converting the round-tripped archive to text",
            Stage::Diff => "Comparing the two texts",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extract0 => "extract0",
            Stage::Verify0 => "verify0",
            Stage::Convert0 => "convert0",
            Stage::RoundTrip => "round_trip",
            Stage::VerifyRoundTrip => "verify_round_trip",
            Stage::Extract1 => "extract1",
            Stage::Convert1 => "convert1",
            Stage::Diff => "diff",
        };
        f.write_str(name)
    }
}

/// Runs the stages strictly in order and stops at the first failure.
pub struct Pipeline {
    runner: Box<dyn StageRunner>,
    member_count: Option<usize>,
    scratch_root: Option<PathBuf>,
    keep_scratch: bool,
}

impl Pipeline {
    pub fn new(runner: Box<dyn StageRunner>) -> Self {
        Pipeline {
            runner,
            member_count: None,
            scratch_root: None,
            keep_scratch: false,
        }
    }

    /// Extract this many members instead of asking the archive header.
    pub fn with_member_count(mut self, member_count: Option<usize>) -> Self {
        self.member_count = member_count;
        self
    }

    /// Put the per-run directory under `root`, sweeping stale artifacts from
    /// `root` first.
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    pub fn keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    pub fn run(&self, archive: &Path) -> Result<PipelineReport, Error> {
        if let Some(root) = &self.scratch_root {
            sweep(root)?;
        }
        let scratch = Scratch::new(self.scratch_root.as_deref(), self.keep_scratch)?;
        let mut run = Run {
            runner: self.runner.as_ref(),
            scratch: &scratch,
            stages: Vec::new(),
        };

        let count = run.stage(Stage::Extract0, |run, artifacts| {
            let count = match self.member_count {
                Some(count) => count,
                None => {
                    let bytes = fs::read(archive).map_err(StageError::file_io(archive))?;
                    read_header(&bytes)?.num_fonts as usize
                }
            };
            if count == 0 {
                return Err(fontcoll::Error::Empty.into());
            }
            run.extract_all(archive, count, Artifact::Member, artifacts)?;
            Ok(count)
        })?;

        run.stage(Stage::Verify0, |run, _| run.runner.verify(archive))?;

        let original_text = run.stage(Stage::Convert0, |run, artifacts| {
            run.convert(archive, Artifact::OriginalText, artifacts)
        })?;

        let round_trip = run.stage(Stage::RoundTrip, |run, artifacts| {
            run.convert(&original_text, Artifact::RoundTrip, artifacts)
        })?;

        run.stage(Stage::VerifyRoundTrip, |run, _| run.runner.verify(&round_trip))?;

        run.stage(Stage::Extract1, |run, artifacts| {
            run.extract_all(&round_trip, count, Artifact::RoundTripMember, artifacts)
        })?;

        let round_trip_text = run.stage(Stage::Convert1, |run, artifacts| {
            run.convert(&round_trip, Artifact::RoundTripText, artifacts)
        })?;

        let diagnostic = run.stage(Stage::Diff, |_, _| {
            let original = read_text(&original_text)?;
            let again = read_text(&round_trip_text)?;
            Ok(compare_text(&original, &again))
        })?;
        if let Diagnostic::TextMismatch { changed_lines, .. } = &diagnostic {
            warn!(
                "{}: text differs after a round trip ({changed_lines} changed lines)",
                archive.display()
            );
        }

        Ok(PipelineReport {
            archive: archive.to_path_buf(),
            scratch: scratch.is_kept().then(|| scratch.path().to_path_buf()),
            stages: run.stages,
            diagnostic,
        })
    }
}

/// State threaded through the stages of one run.
struct Run<'a> {
    runner: &'a dyn StageRunner,
    scratch: &'a Scratch,
    stages: Vec<StageRecord>,
}

impl Run<'_> {
    fn stage<T>(
        &mut self,
        stage: Stage,
        work: impl FnOnce(&Self, &mut Vec<PathBuf>) -> Result<T, StageError>,
    ) -> Result<T, Error> {
        info!("{}", stage.banner());
        let start = Instant::now();
        let mut artifacts = Vec::new();
        let value = work(self, &mut artifacts).map_err(|source| {
            error!("stage '{stage}' failed: {source}");
            Error::StoppedAt { stage, source }
        })?;
        self.stages.push(StageRecord {
            stage,
            duration_ms: start.elapsed().as_millis() as u64,
            artifacts,
        });
        Ok(value)
    }

    fn extract_all(
        &self,
        archive: &Path,
        count: usize,
        artifact: fn(usize) -> Artifact,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<(), StageError> {
        for index in 0..count {
            let out = self.scratch.prepare(artifact(index))?;
            self.runner.extract(archive, index, &out)?;
            artifacts.push(out);
        }
        Ok(())
    }

    fn convert(
        &self,
        input: &Path,
        artifact: Artifact,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<PathBuf, StageError> {
        let out = self.scratch.prepare(artifact)?;
        self.runner.convert(input, &out)?;
        artifacts.push(out.clone());
        Ok(out)
    }
}

fn read_text(path: &Path) -> Result<String, StageError> {
    fs::read_to_string(path).map_err(StageError::file_io(path))
}
