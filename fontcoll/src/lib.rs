//! Font collections (TTC) as a mutable model.
//!
//! A collection is read into a [`Collection`], in which each member lists its
//! tables either as owned bytes or as a reference to an identical table held
//! by an earlier member. From there it can be written back to binary, split
//! into standalone fonts, dumped to a ttx-style XML text, or checked against a
//! set of structural [`verify::Expectations`].

mod collection;
mod error;
pub mod extract;
mod read;
mod sfnt;
pub mod ttx;
pub mod verify;
mod write;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use collection::{Collection, Member, Table, TableData, TtcVersion};
pub use error::Error;
pub use read::{read_header, ChecksumPolicy, CollectionHeader, FileKind};
pub use sfnt::{checksum, table_checksum};
pub use write::write_font;
