//! Per-run scratch space for stage artifacts

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info};
use regex::Regex;
use tempfile::TempDir;

use crate::{error::StageError, Error};

const SCRATCH_PREFIX: &str = "ttc-roundtrip-";

/// Names of everything a run writes. Older runs wrote these straight into a
/// shared directory, which is what [`sweep`] cleans up.
static ARTIFACT_PATTERN: &str =
    r"^(member\d+\.ttf|original\.ttx|roundtrip\.ttc|roundtrip-member\d+\.ttf|roundtrip\.ttx)$";

/// A file produced by one stage and consumed by a later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Artifact {
    Member(usize),
    OriginalText,
    RoundTrip,
    RoundTripMember(usize),
    RoundTripText,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        match self {
            Artifact::Member(index) => format!("member{index}.ttf"),
            Artifact::OriginalText => "original.ttx".to_string(),
            Artifact::RoundTrip => "roundtrip.ttc".to_string(),
            Artifact::RoundTripMember(index) => format!("roundtrip-member{index}.ttf"),
            Artifact::RoundTripText => "roundtrip.ttx".to_string(),
        }
    }
}

/// A uniquely named directory, removed on drop unless asked to keep it.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
    keep: bool,
}

impl Scratch {
    /// Create a fresh directory under `root`, or the system temp dir.
    pub fn new(root: Option<&Path>, keep: bool) -> Result<Scratch, Error> {
        let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .disable_cleanup(keep)
            .tempdir_in(&root)
            .map_err(|source| Error::Scratch { path: root, source })?;
        debug!("scratch directory {}", dir.path().display());
        Ok(Scratch { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Whether the directory outlives this value.
    pub fn is_kept(&self) -> bool {
        self.keep
    }

    /// The path for `artifact`, with anything already there removed.
    pub fn prepare(&self, artifact: Artifact) -> Result<PathBuf, StageError> {
        let path = self.path().join(artifact.file_name());
        match fs::remove_file(&path) {
            Ok(()) => debug!("removed stale {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => return Err(StageError::file_io(path)(e)),
        }
        Ok(path)
    }
}

/// Remove stale artifacts lying directly in `root`, returning how many went.
pub fn sweep(root: &Path) -> Result<usize, Error> {
    let pattern = Regex::new(ARTIFACT_PATTERN)?;
    let file_io = |source| Error::FileIo {
        path: root.to_path_buf(),
        source,
    };
    let mut removed = 0;
    for entry in fs::read_dir(root).map_err(file_io)? {
        let entry = entry.map_err(file_io)?;
        let name = entry.file_name();
        if !pattern.is_match(&name.to_string_lossy()) || !entry.path().is_file() {
            continue;
        }
        fs::remove_file(entry.path()).map_err(|source| Error::FileIo {
            path: entry.path(),
            source,
        })?;
        removed += 1;
    }
    if removed > 0 {
        info!("swept {removed} stale artifacts from {}", root.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::tempdir;

    use super::*;

    #[rstest]
    #[case(Artifact::Member(0), "member0.ttf")]
    #[case(Artifact::OriginalText, "original.ttx")]
    #[case(Artifact::RoundTrip, "roundtrip.ttc")]
    #[case(Artifact::RoundTripMember(12), "roundtrip-member12.ttf")]
    #[case(Artifact::RoundTripText, "roundtrip.ttx")]
    fn artifact_names_match_sweep_pattern(#[case] artifact: Artifact, #[case] name: &str) {
        assert_eq!(artifact.file_name(), name);
        assert!(Regex::new(ARTIFACT_PATTERN).unwrap().is_match(name));
    }

    #[test]
    fn sweep_only_removes_artifacts() {
        let root = tempdir().unwrap();
        for name in ["member0.ttf", "roundtrip.ttx", "member.ttf", "notes.txt"] {
            fs::write(root.path().join(name), b"").unwrap();
        }
        fs::create_dir(root.path().join("original.ttx")).unwrap();

        assert_eq!(sweep(root.path()).unwrap(), 2);
        let mut left = fs::read_dir(root.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        left.sort();
        assert_eq!(left, vec!["member.ttf", "notes.txt", "original.ttx"]);
    }

    #[test]
    fn runs_are_isolated() {
        let root = tempdir().unwrap();
        let first = Scratch::new(Some(root.path()), false).unwrap();
        let second = Scratch::new(Some(root.path()), false).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
    }

    #[test]
    fn prepare_cleans_and_drop_removes() {
        let root = tempdir().unwrap();
        let scratch = Scratch::new(Some(root.path()), false).unwrap();
        let path = scratch.path().join("original.ttx");
        fs::write(&path, b"stale").unwrap();
        assert_eq!(scratch.prepare(Artifact::OriginalText).unwrap(), path);
        assert!(!path.exists());

        let dir = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!dir.exists());
    }

    #[test]
    fn kept_scratch_survives() {
        let root = tempdir().unwrap();
        let scratch = Scratch::new(Some(root.path()), true).unwrap();
        let dir = scratch.path().to_path_buf();
        assert!(scratch.is_kept());
        drop(scratch);
        assert!(dir.is_dir());
    }
}
