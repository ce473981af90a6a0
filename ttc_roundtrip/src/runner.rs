//! Ways of running the extract, convert and verify steps

use std::{ffi::OsString, fs, path::Path, process::Command};

use fontcoll::{
    verify::{verify, Expectations},
    ChecksumPolicy,
};
use log::{debug, error};

use crate::{error::StageError, tool, Error};

/// The three operations the pipeline is built from.
///
/// Each writes its result to `out` (or, for `verify`, only reports) and
/// fails with a [`StageError`] that the pipeline turns into a stop.
pub trait StageRunner {
    fn extract(&self, archive: &Path, index: usize, out: &Path) -> Result<(), StageError>;
    fn convert(&self, input: &Path, out: &Path) -> Result<(), StageError>;
    fn verify(&self, archive: &Path) -> Result<(), StageError>;
}

/// Runs every step in this process.
#[derive(Clone, Debug, Default)]
pub struct Builtin {
    pub checksums: ChecksumPolicy,
    pub expectations: Expectations,
}

impl StageRunner for Builtin {
    fn extract(&self, archive: &Path, index: usize, out: &Path) -> Result<(), StageError> {
        tool::extract_member(archive, index, out, self.checksums)?;
        Ok(())
    }

    fn convert(&self, input: &Path, out: &Path) -> Result<(), StageError> {
        tool::convert(input, out, self.checksums)?;
        Ok(())
    }

    fn verify(&self, archive: &Path) -> Result<(), StageError> {
        let bytes = fs::read(archive).map_err(StageError::file_io(archive))?;
        let report = verify(&bytes, &self.expectations, self.checksums);
        if report.passed() {
            return Ok(());
        }
        for finding in &report.findings {
            error!("{}: {finding}", archive.display());
        }
        Err(StageError::Verification(report))
    }
}

/// Runs each step as a child process.
///
/// `tool` is called as `tool -y <index> -e -o <out> <archive>` to extract and
/// `tool -v -e -o <out> <input>` to convert; `verifier` as `verifier <archive>`.
/// Any non-zero exit is a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct External {
    tool: Vec<String>,
    verifier: Vec<String>,
}

impl External {
    pub fn new(tool: Vec<String>, verifier: Vec<String>) -> Result<External, Error> {
        if tool.is_empty() {
            return Err(Error::EmptyCommand("tool"));
        }
        if verifier.is_empty() {
            return Err(Error::EmptyCommand("verifier"));
        }
        Ok(External { tool, verifier })
    }

    fn extract_argv(&self, archive: &Path, index: usize, out: &Path) -> Vec<OsString> {
        let mut argv = os_strings(&self.tool);
        argv.extend([
            "-y".into(),
            index.to_string().into(),
            "-e".into(),
            "-o".into(),
            out.into(),
            archive.into(),
        ]);
        argv
    }

    fn convert_argv(&self, input: &Path, out: &Path) -> Vec<OsString> {
        let mut argv = os_strings(&self.tool);
        argv.extend(["-v".into(), "-e".into(), "-o".into(), out.into(), input.into()]);
        argv
    }

    fn verify_argv(&self, archive: &Path) -> Vec<OsString> {
        let mut argv = os_strings(&self.verifier);
        argv.push(archive.into());
        argv
    }
}

fn os_strings(args: &[String]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

/// Run to completion; a non-zero exit is an error carrying the child's stderr.
fn run(argv: &[OsString]) -> Result<(), StageError> {
    let command = argv
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(StageError::Spawn {
            command,
            source: std::io::ErrorKind::InvalidInput.into(),
        });
    };
    debug!("running '{command}'");
    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(source) => return Err(StageError::Spawn { command, source }),
    };
    if output.status.success() {
        return Ok(());
    }
    Err(StageError::ExitStatus {
        command,
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

impl StageRunner for External {
    fn extract(&self, archive: &Path, index: usize, out: &Path) -> Result<(), StageError> {
        run(&self.extract_argv(archive, index, out))
    }

    fn convert(&self, input: &Path, out: &Path) -> Result<(), StageError> {
        run(&self.convert_argv(input, out))
    }

    fn verify(&self, archive: &Path) -> Result<(), StageError> {
        run(&self.verify_argv(archive))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fontcoll::test_helpers::{fixture_bytes, fixture_with_os2_version};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn external() -> External {
        External::new(
            vec!["python3".into(), "-m".into(), "fontTools.ttx".into()],
            vec!["ttc-verify".into(), "--os2-version".into(), "4".into()],
        )
        .unwrap()
    }

    fn strings(argv: Vec<OsString>) -> Vec<String> {
        argv.into_iter()
            .map(|arg| arg.into_string().unwrap())
            .collect()
    }

    #[test]
    fn external_command_lines() {
        let archive = PathBuf::from("Lobster.ttc");
        let out = PathBuf::from("scratch/member1.ttf");
        let runner = external();
        assert_eq!(
            strings(runner.extract_argv(&archive, 1, &out)),
            vec![
                "python3",
                "-m",
                "fontTools.ttx",
                "-y",
                "1",
                "-e",
                "-o",
                "scratch/member1.ttf",
                "Lobster.ttc"
            ]
        );
        assert_eq!(
            strings(runner.convert_argv(&archive, Path::new("original.ttx"))),
            vec![
                "python3",
                "-m",
                "fontTools.ttx",
                "-v",
                "-e",
                "-o",
                "original.ttx",
                "Lobster.ttc"
            ]
        );
        assert_eq!(
            strings(runner.verify_argv(&archive)),
            vec!["ttc-verify", "--os2-version", "4", "Lobster.ttc"]
        );
    }

    #[test]
    fn empty_commands_are_rejected() {
        assert!(matches!(
            External::new(Vec::new(), vec!["v".into()]),
            Err(Error::EmptyCommand("tool"))
        ));
        assert!(matches!(
            External::new(vec!["t".into()], Vec::new()),
            Err(Error::EmptyCommand("verifier"))
        ));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run(&["this-program-does-not-exist-ttc".into()]).unwrap_err();
        assert!(matches!(err, StageError::Spawn { .. }));
    }

    #[test]
    fn builtin_verify_follows_checksum_policy() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad-checksum.ttc");
        let mut bytes = fixture_bytes();
        // the recorded checksum of the first member's first table, 'OS/2'
        bytes[36] ^= 0xFF;
        fs::write(&archive, bytes).unwrap();

        assert!(Builtin::default().verify(&archive).is_ok());
        let strict = Builtin {
            checksums: ChecksumPolicy::Error,
            ..Default::default()
        };
        match strict.verify(&archive) {
            Err(StageError::Verification(report)) => {
                assert_eq!(report.members, 0);
                assert_eq!(report.findings.len(), 1);
            }
            other => panic!("expected a checksum finding, got {other:?}"),
        }
    }

    #[test]
    fn builtin_verify_reports_findings() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.ttc");
        let bad = dir.path().join("bad.ttc");
        fs::write(&good, fixture_bytes()).unwrap();
        fs::write(&bad, fixture_with_os2_version(3).to_bytes().unwrap()).unwrap();

        let runner = Builtin {
            expectations: Expectations {
                os2_version: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(runner.verify(&good).is_ok());
        match runner.verify(&bad) {
            Err(StageError::Verification(report)) => assert_eq!(report.findings.len(), 2),
            other => panic!("expected findings, got {other:?}"),
        }
    }
}
