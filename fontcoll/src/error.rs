use std::{io, path::PathBuf};

use thiserror::Error;
use write_fonts::{read::ReadError, types::Tag};

use crate::ttx::TextError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read font data: '{0}'")]
    FontRead(#[from] ReadError),
    #[error("not a font collection (bad TTC tag)")]
    NotACollection,
    #[error("unrecognized TTC version 0x{0:08x}")]
    UnsupportedVersion(u32),
    #[error("not a font collection (not enough data)")]
    Truncated,
    #[error("table '{tag}' of member {member} (offset {offset}, length {length}) lies outside the file")]
    TableOutOfBounds {
        member: usize,
        tag: Tag,
        offset: u32,
        length: u32,
    },
    #[error("bad checksum for '{tag}' table of member {member}: expected 0x{expected:08x}, found 0x{found:08x}")]
    BadChecksum {
        member: usize,
        tag: Tag,
        expected: u32,
        found: u32,
    },
    #[error("specify a font number between 0 and {} (inclusive), got {index}", .count.saturating_sub(1))]
    MemberIndex { index: usize, count: usize },
    #[error("member {member} reuses '{tag}' from member {from}, which does not own such a table")]
    InvalidShare { member: usize, tag: Tag, from: usize },
    #[error("member {member} has more than one '{tag}' table")]
    DuplicateTable { member: usize, tag: Tag },
    #[error("a collection needs at least one member")]
    Empty,
    #[error("collection is too large to address with 32-bit offsets")]
    TooLarge,
    #[error(transparent)]
    Text(#[from] TextError),
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn file_io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
        let path = path.into();
        move |source| Error::FileIo { path, source }
    }
}
