//! What a pipeline run produced

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Stage};

/// How many differing lines the mismatch preview keeps.
const PREVIEW_LINES: usize = 10;

/// The outcome of comparing the first and second text dumps.
///
/// A mismatch is reported, not raised: a round trip is allowed to
/// produce text that differs from the original.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    Identical,
    TextMismatch {
        changed_lines: usize,
        preview: Vec<String>,
    },
}

impl Diagnostic {
    pub fn is_identical(&self) -> bool {
        matches!(self, Diagnostic::Identical)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub duration_ms: u64,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub archive: PathBuf,
    /// Set when the scratch directory was kept
    pub scratch: Option<PathBuf>,
    pub stages: Vec<StageRecord>,
    pub diagnostic: Diagnostic,
}

impl PipelineReport {
    pub fn write_json(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn print_summary(&self) {
        println!("{}", self.archive.display());
        for record in &self.stages {
            println!(
                "  {:<18} {:>6}ms  {} artifact(s)",
                record.stage.to_string(),
                record.duration_ms,
                record.artifacts.len()
            );
        }
        match &self.diagnostic {
            Diagnostic::Identical => println!("text round trip is identical"),
            Diagnostic::TextMismatch {
                changed_lines,
                preview,
            } => {
                println!("text round trip differs in {changed_lines} line(s):");
                for line in preview {
                    println!("  {line}");
                }
            }
        }
        if let Some(scratch) = &self.scratch {
            println!("artifacts kept in {}", scratch.display());
        }
    }
}

/// Compare two text dumps line by line.
pub fn compare_text(original: &str, round_trip: &str) -> Diagnostic {
    if original == round_trip {
        return Diagnostic::Identical;
    }
    let left = original.lines().collect::<Vec<_>>();
    let right = round_trip.lines().collect::<Vec<_>>();
    let mut changed_lines = 0;
    let mut preview = Vec::new();
    for line in diff::slice(&left, &right) {
        let change = match line {
            diff::Result::Left(left) => format!("-{left}"),
            diff::Result::Right(right) => format!("+{right}"),
            diff::Result::Both(..) => continue,
        };
        changed_lines += 1;
        if preview.len() < PREVIEW_LINES {
            preview.push(change);
        }
    }
    // same lines, different terminators
    if changed_lines == 0 {
        changed_lines = 1;
        preview.push("line endings differ".to_string());
    }
    Diagnostic::TextMismatch {
        changed_lines,
        preview,
    }
}
