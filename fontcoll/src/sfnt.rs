//! sfnt directory constants and checksum arithmetic

use write_fonts::types::Tag;

pub(crate) const TTC_TAG: Tag = Tag::new(b"ttcf");
pub(crate) const HEAD: Tag = Tag::new(b"head");

/// TTC header: tag, version, numFonts.
pub(crate) const TTC_HEADER_LEN: usize = 12;
/// ulDsigTag, ulDsigLength, ulDsigOffset; version 2.0 only
pub(crate) const TTC_DSIG_LEN: usize = 12;
/// sfntVersion, numTables, searchRange, entrySelector, rangeShift
pub(crate) const SFNT_HEADER_LEN: usize = 12;
/// tag, checkSum, offset, length
pub(crate) const TABLE_RECORD_LEN: usize = 16;

/// Byte offset of `checkSumAdjustment` in the 'head' table
pub(crate) const HEAD_ADJUSTMENT_OFFSET: usize = 8;
pub(crate) const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// Sum of the data as big-endian u32s, zero-padding the final word.
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// The checksum recorded in a table directory.
///
/// The 'head' table is summed as if `checkSumAdjustment` were zero.
pub fn table_checksum(tag: Tag, data: &[u8]) -> u32 {
    let sum = checksum(data);
    match adjustment_word(tag, data) {
        Some(adjustment) => sum.wrapping_sub(adjustment),
        None => sum,
    }
}

fn adjustment_word(tag: Tag, data: &[u8]) -> Option<u32> {
    if tag != HEAD {
        return None;
    }
    data.get(HEAD_ADJUSTMENT_OFFSET..HEAD_ADJUSTMENT_OFFSET + 4)
        .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

/// `(searchRange, entrySelector, rangeShift)` for a directory of `n` tables
pub(crate) fn search_range(n: u16) -> (u16, u16, u16) {
    let entry_selector = if n == 0 {
        0
    } else {
        (u16::BITS - 1 - n.leading_zeros()) as u16
    };
    let search_range = (1u16 << entry_selector).saturating_mul(TABLE_RECORD_LEN as u16);
    let range_shift = n
        .saturating_mul(TABLE_RECORD_LEN as u16)
        .saturating_sub(search_range);
    (search_range, entry_selector, range_shift)
}

/// Number of zero bytes needed to bring `len` to a 4-byte boundary
pub(crate) fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}
