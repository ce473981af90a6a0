//! The in-memory model of a font collection

use std::collections::HashSet;

use write_fonts::types::Tag;

use crate::Error;

/// A font collection: an ordered list of member fonts that may share tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    pub version: TtcVersion,
    pub members: Vec<Member>,
}

/// The version of the TTC header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TtcVersion {
    #[default]
    V1,
    /// Version 2.0 carries DSIG fields; we always write them as zero.
    V2,
}

/// One font program inside a collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub sfnt_version: u32,
    /// Tables in layout order.
    pub tables: Vec<Table>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub tag: Tag,
    pub data: TableData,
}

/// Where a member gets the bytes for a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableData {
    Owned(Vec<u8>),
    /// The table with the same tag in member `from`, which must come earlier
    /// and must own it.
    Shared { from: usize },
}

impl TtcVersion {
    pub const V1_RAW: u32 = 0x0001_0000;
    pub const V2_RAW: u32 = 0x0002_0000;

    pub fn from_raw(raw: u32) -> Result<Self, Error> {
        match raw {
            Self::V1_RAW => Ok(TtcVersion::V1),
            Self::V2_RAW => Ok(TtcVersion::V2),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            TtcVersion::V1 => Self::V1_RAW,
            TtcVersion::V2 => Self::V2_RAW,
        }
    }
}

impl Table {
    pub fn owned(tag: Tag, data: impl Into<Vec<u8>>) -> Self {
        Table {
            tag,
            data: TableData::Owned(data.into()),
        }
    }

    pub fn shared(tag: Tag, from: usize) -> Self {
        Table {
            tag,
            data: TableData::Shared { from },
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.data, TableData::Shared { .. })
    }
}

impl Member {
    pub fn new(sfnt_version: u32, tables: Vec<Table>) -> Self {
        Member {
            sfnt_version,
            tables,
        }
    }

    pub fn table(&self, tag: Tag) -> Option<&Table> {
        self.tables.iter().find(|table| table.tag == tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tables.iter().map(|table| table.tag)
    }
}

impl Collection {
    pub fn new(version: TtcVersion, members: Vec<Member>) -> Self {
        Collection { version, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, index: usize) -> Result<&Member, Error> {
        self.members.get(index).ok_or(Error::MemberIndex {
            index,
            count: self.members.len(),
        })
    }

    /// The bytes of a member's table, following a share to its owner.
    pub fn table_data(&self, member: usize, tag: Tag) -> Option<&[u8]> {
        let table = self.members.get(member)?.table(tag)?;
        match &table.data {
            TableData::Owned(data) => Some(data.as_slice()),
            TableData::Shared { from } => match &self.members.get(*from)?.table(tag)?.data {
                TableData::Owned(data) => Some(data.as_slice()),
                TableData::Shared { .. } => None,
            },
        }
    }

    /// All tables of a member with shares resolved, in layout order.
    pub fn resolved_tables(&self, member: usize) -> Result<Vec<(Tag, &[u8])>, Error> {
        let target = self.member(member)?;
        target
            .tables
            .iter()
            .map(|table| {
                let data = self.table_data(member, table.tag).ok_or(Error::InvalidShare {
                    member,
                    tag: table.tag,
                    from: match table.data {
                        TableData::Shared { from } => from,
                        TableData::Owned(_) => member,
                    },
                })?;
                Ok((table.tag, data))
            })
            .collect()
    }

    /// Number of table entries that point at another member's data.
    pub fn shared_count(&self) -> usize {
        self.members
            .iter()
            .flat_map(|member| member.tables.iter())
            .filter(|table| table.is_shared())
            .count()
    }

    /// Put each member's tables in the order they read back from binary:
    /// shared entries first, in the order of the copies they point at, then
    /// owned tables in their stored order.
    ///
    /// A shared table always lies inside an earlier member's data, so no other
    /// order survives [`Collection::to_bytes`].
    pub fn sort_tables(&mut self) {
        for index in 0..self.members.len() {
            let (earlier, rest) = self.members.split_at_mut(index);
            let member = &mut rest[0];
            member.tables.sort_by_key(|table| match table.data {
                TableData::Shared { from } => {
                    let position = earlier
                        .get(from)
                        .and_then(|owner| owner.tables.iter().position(|t| t.tag == table.tag))
                        .unwrap_or(usize::MAX);
                    (0, from, position)
                }
                TableData::Owned(_) => (1, 0, 0),
            });
        }
    }

    /// Check that every share points backwards at an owned table, and that no
    /// member lists a tag twice.
    pub fn validate(&self) -> Result<(), Error> {
        if self.members.is_empty() {
            return Err(Error::Empty);
        }
        for (index, member) in self.members.iter().enumerate() {
            let mut seen = HashSet::new();
            for table in &member.tables {
                if !seen.insert(table.tag) {
                    return Err(Error::DuplicateTable {
                        member: index,
                        tag: table.tag,
                    });
                }
                let TableData::Shared { from } = table.data else {
                    continue;
                };
                let owner_has_it = from < index
                    && self.members[from]
                        .table(table.tag)
                        .is_some_and(|owner| !owner.is_shared());
                if !owner_has_it {
                    return Err(Error::InvalidShare {
                        member: index,
                        tag: table.tag,
                        from,
                    });
                }
            }
        }
        Ok(())
    }
}
