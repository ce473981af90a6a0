//! Synthetic collections for tests.
//!
//! The fixture has two TrueType members. They share 'maxp' and 'name', and
//! each has its own 'head' and a version 4 'OS/2' with a different weight
//! class.

use write_fonts::types::Tag;

use crate::{Collection, Member, Table, TtcVersion};

pub const TRUETYPE: u32 = 0x0001_0000;
pub const HEAD: Tag = Tag::new(b"head");
pub const MAXP: Tag = Tag::new(b"maxp");
pub const NAME: Tag = Tag::new(b"name");
pub const OS2: Tag = Tag::new(b"OS/2");

pub const FAMILY_NAME: &str = "Test Sans";

pub fn head(font_revision: u32) -> Vec<u8> {
    let mut data = vec![0u8; 54];
    data[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    data[4..8].copy_from_slice(&font_revision.to_be_bytes());
    // magicNumber
    data[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    // unitsPerEm
    data[18..20].copy_from_slice(&1000u16.to_be_bytes());
    data
}

pub fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut data = 0x0000_5000u32.to_be_bytes().to_vec();
    data.extend(num_glyphs.to_be_bytes());
    data
}

/// An OS/2 table of the given version, zeroed apart from the weight class.
pub fn os2(version: u16, weight_class: u16) -> Vec<u8> {
    let len = match version {
        0 => 78,
        1 => 86,
        2..=4 => 96,
        _ => 100,
    };
    let mut data = vec![0u8; len];
    data[0..2].copy_from_slice(&version.to_be_bytes());
    data[4..6].copy_from_slice(&weight_class.to_be_bytes());
    data
}

/// A format 0 'name' table with a single Windows English family name.
pub fn name(family: &str) -> Vec<u8> {
    let string = family
        .encode_utf16()
        .flat_map(|unit| unit.to_be_bytes())
        .collect::<Vec<_>>();
    let mut data = Vec::new();
    // version, count, storageOffset
    for value in [0u16, 1, 6 + 12] {
        data.extend(value.to_be_bytes());
    }
    // platform, encoding, language, nameID, length, offset
    for value in [3u16, 1, 0x0409, 1, string.len() as u16, 0] {
        data.extend(value.to_be_bytes());
    }
    data.extend(string);
    data
}

pub fn fixture_collection() -> Collection {
    fixture_with_os2_version(4)
}

pub fn fixture_with_os2_version(version: u16) -> Collection {
    let regular = Member::new(
        TRUETYPE,
        vec![
            Table::owned(HEAD, head(0x0001_0000)),
            Table::owned(MAXP, maxp(1)),
            Table::owned(NAME, name(FAMILY_NAME)),
            Table::owned(OS2, os2(version, 400)),
        ],
    );
    // shares come first: they sit in the first member's data, which precedes
    // this member's own tables when laid out.
    let bold = Member::new(
        TRUETYPE,
        vec![
            Table::shared(MAXP, 0),
            Table::shared(NAME, 0),
            Table::owned(HEAD, head(0x0001_8000)),
            Table::owned(OS2, os2(version, 700)),
        ],
    );
    Collection::new(TtcVersion::V1, vec![regular, bold])
}

pub fn fixture_bytes() -> Vec<u8> {
    fixture_collection()
        .to_bytes()
        .expect("fixture collection is valid")
}
