//! Loading collections from binary

use std::{collections::HashMap, fmt::Display, str::FromStr};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use write_fonts::{
    read::{FileRef, FontData},
    types::Tag,
};

use crate::{
    collection::{Collection, Member, Table, TableData, TtcVersion},
    sfnt::{self, TTC_HEADER_LEN},
    Error,
};

/// What to do when a table's data does not match its directory checksum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    Ignore,
    /// Log a warning and carry on
    #[default]
    Warn,
    Error,
}

/// The fixed part of a TTC header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionHeader {
    pub version: TtcVersion,
    pub num_fonts: u32,
}

/// A rough classification of an input file, from its first bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Collection,
    Font,
    Text,
    Unknown,
}

impl FileKind {
    pub fn sniff(bytes: &[u8]) -> FileKind {
        match bytes.get(..4) {
            Some(b"ttcf") => return FileKind::Collection,
            Some(b"\0\x01\0\0" | b"OTTO" | b"true") => return FileKind::Font,
            _ => (),
        }
        let text = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match text.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => FileKind::Text,
            _ => FileKind::Unknown,
        }
    }
}

/// Read the TTC header without decoding any member.
pub fn read_header(bytes: &[u8]) -> Result<CollectionHeader, Error> {
    if bytes.get(..4) != Some(&sfnt::TTC_TAG.to_be_bytes()[..]) {
        return Err(Error::NotACollection);
    }
    if bytes.len() < TTC_HEADER_LEN {
        return Err(Error::Truncated);
    }
    let data = FontData::new(bytes);
    let version = TtcVersion::from_raw(data.read_at::<u32>(4)?)?;
    let num_fonts = data.read_at::<u32>(8)?;
    Ok(CollectionHeader { version, num_fonts })
}

/// A table directory entry, copied out of the font.
#[derive(Clone, Copy, Debug)]
struct Record {
    tag: Tag,
    checksum: u32,
    offset: u32,
    length: u32,
}

impl Collection {
    /// Decode a binary collection.
    ///
    /// A table whose (offset, length) was already seen under the same tag in
    /// an earlier member becomes a [`TableData::Shared`] entry. Tables come
    /// back in the order described by [`Collection::sort_tables`].
    pub fn from_bytes(bytes: &[u8], checksums: ChecksumPolicy) -> Result<Collection, Error> {
        let header = read_header(bytes)?;
        let FileRef::Collection(fonts) = FileRef::new(bytes)? else {
            return Err(Error::NotACollection);
        };
        debug!(
            "TTC version 0x{:08x} with {} fonts",
            header.version.to_raw(),
            header.num_fonts
        );

        // (offset, length) -> (owning member, tag)
        let mut owners: HashMap<(u32, u32), (usize, Tag)> = HashMap::new();
        let mut members = Vec::with_capacity(fonts.len() as usize);
        for index in 0..fonts.len() {
            let font = fonts.get(index)?;
            let member = index as usize;
            let mut records = font
                .table_directory
                .table_records()
                .iter()
                .map(|rec| Record {
                    tag: rec.tag(),
                    checksum: rec.checksum(),
                    offset: rec.offset(),
                    length: rec.length(),
                })
                .collect::<Vec<_>>();
            records.sort_by_key(|rec| rec.offset);

            let mut tables = Vec::with_capacity(records.len());
            for rec in records {
                let key = (rec.offset, rec.length);
                match owners.get(&key) {
                    Some(&(owner, tag)) if tag == rec.tag && owner != member => {
                        debug!("member {member} reuses '{}' from member {owner}", rec.tag);
                        tables.push(Table::shared(rec.tag, owner));
                        continue;
                    }
                    Some(_) => (),
                    None => {
                        owners.insert(key, (member, rec.tag));
                    }
                }
                let data = table_bytes(bytes, member, &rec)?;
                check_checksum(member, &rec, data, checksums)?;
                tables.push(Table {
                    tag: rec.tag,
                    data: TableData::Owned(data.to_vec()),
                });
            }
            debug!(
                "member {member} has {} tables: {:?}",
                tables.len(),
                tables.iter().map(|t| t.tag).collect::<Vec<_>>()
            );
            members.push(Member::new(font.table_directory.sfnt_version(), tables));
        }

        if members.is_empty() {
            return Err(Error::Empty);
        }
        let mut collection = Collection::new(header.version, members);
        collection.sort_tables();
        Ok(collection)
    }
}

fn table_bytes<'a>(bytes: &'a [u8], member: usize, rec: &Record) -> Result<&'a [u8], Error> {
    let start = rec.offset as usize;
    start
        .checked_add(rec.length as usize)
        .and_then(|end| bytes.get(start..end))
        .ok_or(Error::TableOutOfBounds {
            member,
            tag: rec.tag,
            offset: rec.offset,
            length: rec.length,
        })
}

fn check_checksum(
    member: usize,
    rec: &Record,
    data: &[u8],
    policy: ChecksumPolicy,
) -> Result<(), Error> {
    if policy == ChecksumPolicy::Ignore {
        return Ok(());
    }
    let found = sfnt::table_checksum(rec.tag, data);
    if found == rec.checksum {
        return Ok(());
    }
    match policy {
        ChecksumPolicy::Error => Err(Error::BadChecksum {
            member,
            tag: rec.tag,
            expected: rec.checksum,
            found,
        }),
        _ => {
            warn!("bad checksum for '{}' table of member {member}", rec.tag);
            Ok(())
        }
    }
}

impl Display for ChecksumPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChecksumPolicy::Ignore => f.write_str("ignore"),
            ChecksumPolicy::Warn => f.write_str("warn"),
            ChecksumPolicy::Error => f.write_str("error"),
        }
    }
}

impl FromStr for ChecksumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "expected one of 'ignore', 'warn', 'error', found '{other}'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use write_fonts::read::FontRef;

    use super::*;
    use crate::test_helpers::{fixture_bytes, fixture_collection, MAXP, NAME, OS2};

    fn record_offset(bytes: &[u8], member: u32, tag: Tag) -> usize {
        let font = FontRef::from_index(bytes, member).unwrap();
        let rec = font
            .table_directory
            .table_records()
            .iter()
            .find(|rec| rec.tag() == tag)
            .unwrap();
        rec.offset() as usize
    }

    #[test]
    fn binary_round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();
        let coll = fixture_collection();
        let bytes = coll.to_bytes().unwrap();
        let read = Collection::from_bytes(&bytes, ChecksumPolicy::Error).unwrap();
        assert_eq!(read, coll);
    }

    #[test]
    fn shared_tables_are_detected_by_offset() {
        let coll = Collection::from_bytes(&fixture_bytes(), ChecksumPolicy::Error).unwrap();
        let second = &coll.members[1];
        assert_eq!(second.table(MAXP).unwrap().data, TableData::Shared { from: 0 });
        assert_eq!(second.table(NAME).unwrap().data, TableData::Shared { from: 0 });
        assert!(!second.table(OS2).unwrap().is_shared());
    }

    #[test]
    fn header_only() {
        let header = read_header(&fixture_bytes()).unwrap();
        assert_eq!(
            header,
            CollectionHeader {
                version: TtcVersion::V1,
                num_fonts: 2
            }
        );
    }

    #[test]
    fn single_font_is_not_a_collection() {
        let coll = fixture_collection();
        let font = crate::extract::extract(&coll, 0).unwrap();
        assert!(matches!(
            Collection::from_bytes(&font, ChecksumPolicy::Warn),
            Err(Error::NotACollection)
        ));
        assert_eq!(FileKind::sniff(&font), FileKind::Font);
    }

    #[test]
    fn truncated_header() {
        assert!(matches!(read_header(b"ttcf\0\x01"), Err(Error::Truncated)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = fixture_bytes();
        bytes[4..8].copy_from_slice(&0x0003_0000u32.to_be_bytes());
        assert!(matches!(
            read_header(&bytes),
            Err(Error::UnsupportedVersion(0x0003_0000))
        ));
    }

    #[test]
    fn checksum_policies() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut bytes = fixture_bytes();
        let offset = record_offset(&bytes, 0, OS2);
        // usWeightClass
        bytes[offset + 4] ^= 0xFF;

        assert!(Collection::from_bytes(&bytes, ChecksumPolicy::Ignore).is_ok());
        assert!(Collection::from_bytes(&bytes, ChecksumPolicy::Warn).is_ok());
        assert!(matches!(
            Collection::from_bytes(&bytes, ChecksumPolicy::Error),
            Err(Error::BadChecksum { member: 0, tag, .. }) if tag == OS2
        ));
    }

    #[test]
    fn sniffing() {
        assert_eq!(FileKind::sniff(&fixture_bytes()), FileKind::Collection);
        assert_eq!(
            FileKind::sniff(b"\xEF\xBB\xBF\n  <?xml version=\"1.0\"?>"),
            FileKind::Text
        );
        assert_eq!(FileKind::sniff(b"OTTO"), FileKind::Font);
        assert_eq!(FileKind::sniff(b"wOF2"), FileKind::Unknown);
        assert_eq!(FileKind::sniff(b""), FileKind::Unknown);
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("Error".parse::<ChecksumPolicy>(), Ok(ChecksumPolicy::Error));
        assert_eq!(" warn".parse::<ChecksumPolicy>(), Ok(ChecksumPolicy::Warn));
        assert!("strict".parse::<ChecksumPolicy>().is_err());
        assert_eq!(ChecksumPolicy::default().to_string(), "warn");
    }
}
