//! Serializing collections and standalone fonts

use std::collections::HashMap;

use log::debug;
use write_fonts::types::Tag;

use crate::{
    collection::{Collection, TableData, TtcVersion},
    sfnt::{
        self, CHECKSUM_MAGIC, HEAD, HEAD_ADJUSTMENT_OFFSET, SFNT_HEADER_LEN, TABLE_RECORD_LEN,
        TTC_DSIG_LEN, TTC_HEADER_LEN, TTC_TAG,
    },
    Error,
};

/// A table directory entry as it will be written.
#[derive(Clone, Copy, Debug)]
struct Record {
    tag: Tag,
    checksum: u32,
    offset: u32,
    length: u32,
}

impl Collection {
    /// Encode as a TTC.
    ///
    /// Each member's directory is followed by the tables it owns, in stored
    /// order. Shared entries point at the owner's copy. No whole-file
    /// checksum adjustment is computed; 'head' is written as stored.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.validate()?;
        let num_fonts = self.members.len();
        let mut header_len = TTC_HEADER_LEN + 4 * num_fonts;
        if self.version == TtcVersion::V2 {
            header_len += TTC_DSIG_LEN;
        }

        let mut out = vec![0u8; header_len];
        let mut member_offsets = Vec::with_capacity(num_fonts);
        let mut placed: HashMap<(usize, Tag), Record> = HashMap::new();

        for (index, member) in self.members.iter().enumerate() {
            let dir_start = out.len();
            member_offsets.push(to_offset(dir_start)?);
            let dir_end = dir_start + directory_len(member.tables.len());
            out.resize(dir_end, 0);

            let mut records = Vec::with_capacity(member.tables.len());
            for table in &member.tables {
                let record = match &table.data {
                    TableData::Owned(data) => {
                        let record = append_table(&mut out, table.tag, data)?;
                        placed.insert((index, table.tag), record);
                        record
                    }
                    TableData::Shared { from } => *placed.get(&(*from, table.tag)).ok_or(
                        Error::InvalidShare {
                            member: index,
                            tag: table.tag,
                            from: *from,
                        },
                    )?,
                };
                records.push(record);
            }
            debug!(
                "member {index}: directory at {dir_start}, {} tables",
                records.len()
            );
            write_directory(&mut out[dir_start..dir_end], member.sfnt_version, records)?;
        }

        let mut header = Vec::with_capacity(header_len);
        header.extend(TTC_TAG.to_be_bytes());
        header.extend(self.version.to_raw().to_be_bytes());
        header.extend(to_offset(num_fonts)?.to_be_bytes());
        for offset in member_offsets {
            header.extend(offset.to_be_bytes());
        }
        // a V2 header with no signature has a zeroed DSIG triple
        header.resize(header_len, 0);
        out[..header_len].copy_from_slice(&header);
        Ok(out)
    }
}

/// Encode a standalone sfnt from tables in layout order.
///
/// The directory is sorted by tag; the 'head' checkSumAdjustment is set so
/// that the whole file sums to 0xB1B0AFBA.
pub fn write_font(sfnt_version: u32, tables: &[(Tag, &[u8])]) -> Result<Vec<u8>, Error> {
    let mut out = vec![0u8; directory_len(tables.len())];
    let mut records = Vec::with_capacity(tables.len());
    for (tag, data) in tables {
        records.push(append_table(&mut out, *tag, data)?);
    }
    let head = records.iter().find(|rec| rec.tag == HEAD).copied();
    let table_sum = records
        .iter()
        .fold(0u32, |sum, rec| sum.wrapping_add(rec.checksum));

    let dir_len = directory_len(records.len());
    write_directory(&mut out[..dir_len], sfnt_version, records)?;

    if let Some(head) = head.filter(|head| head.length as usize >= HEAD_ADJUSTMENT_OFFSET + 4) {
        let total = sfnt::checksum(&out[..dir_len]).wrapping_add(table_sum);
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(total);
        let pos = head.offset as usize + HEAD_ADJUSTMENT_OFFSET;
        out[pos..pos + 4].copy_from_slice(&adjustment.to_be_bytes());
        debug!("checkSumAdjustment 0x{adjustment:08x}");
    }
    to_offset(out.len())?;
    Ok(out)
}

fn directory_len(num_tables: usize) -> usize {
    SFNT_HEADER_LEN + TABLE_RECORD_LEN * num_tables
}

fn to_offset(pos: usize) -> Result<u32, Error> {
    u32::try_from(pos).map_err(|_| Error::TooLarge)
}

/// Append table data at the current end, padded to a 4-byte boundary.
fn append_table(out: &mut Vec<u8>, tag: Tag, data: &[u8]) -> Result<Record, Error> {
    let offset = to_offset(out.len())?;
    let length = to_offset(data.len())?;
    out.extend_from_slice(data);
    out.resize(out.len() + sfnt::padding(data.len()), 0);
    Ok(Record {
        tag,
        checksum: sfnt::table_checksum(tag, data),
        offset,
        length,
    })
}

fn write_directory(
    target: &mut [u8],
    sfnt_version: u32,
    mut records: Vec<Record>,
) -> Result<(), Error> {
    records.sort_by_key(|rec| rec.tag);
    let num_tables = u16::try_from(records.len()).map_err(|_| Error::TooLarge)?;
    let (search_range, entry_selector, range_shift) = sfnt::search_range(num_tables);

    let mut dir = Vec::with_capacity(directory_len(records.len()));
    dir.extend(sfnt_version.to_be_bytes());
    dir.extend(num_tables.to_be_bytes());
    dir.extend(search_range.to_be_bytes());
    dir.extend(entry_selector.to_be_bytes());
    dir.extend(range_shift.to_be_bytes());
    for rec in records {
        dir.extend(rec.tag.to_be_bytes());
        dir.extend(rec.checksum.to_be_bytes());
        dir.extend(rec.offset.to_be_bytes());
        dir.extend(rec.length.to_be_bytes());
    }
    target.copy_from_slice(&dir);
    Ok(())
}
