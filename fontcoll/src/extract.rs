//! Pulling standalone fonts out of a collection

use std::path::{Path, PathBuf};

use log::info;

use crate::{write::write_font, ChecksumPolicy, Collection, Error};

/// Write member `index` as a self-contained font, with shared tables copied in.
pub fn extract(collection: &Collection, index: usize) -> Result<Vec<u8>, Error> {
    let member = collection.member(index)?;
    let tables = collection.resolved_tables(index)?;
    info!(
        "extracting member {index} of {} ({} tables)",
        collection.len(),
        tables.len()
    );
    write_font(member.sfnt_version, &tables)
}

/// Decode `bytes` as a collection and extract member `index`.
pub fn extract_from_bytes(
    bytes: &[u8],
    index: usize,
    checksums: ChecksumPolicy,
) -> Result<Vec<u8>, Error> {
    let collection = Collection::from_bytes(bytes, checksums)?;
    extract(&collection, index)
}

/// Choose an output file name in `dir`, or next to `input` if there is none.
///
/// With a member index the stem gets a `#<index>` suffix. Unless
/// `overwrite` is set, a further `#1`, `#2`, ... is appended until the name is
/// free.
pub fn output_path(
    input: &Path,
    dir: Option<&Path>,
    index: Option<usize>,
    ext: &str,
    overwrite: bool,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "font".to_string());
    let stem = match index {
        Some(index) => format!("{stem}#{index}"),
        None => stem,
    };
    let dir = dir
        .or_else(|| input.parent())
        .unwrap_or_else(|| Path::new(""));
    let mut candidate = dir.join(format!("{stem}.{ext}"));
    if overwrite {
        return candidate;
    }
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}#{n}.{ext}"));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use write_fonts::read::{FileRef, TableProvider};

    use super::*;
    use crate::test_helpers::{fixture_bytes, fixture_collection, HEAD, MAXP, NAME, OS2};

    #[test]
    fn every_member_extracts_to_a_font() {
        let coll = fixture_collection();
        for index in 0..coll.len() {
            let bytes = extract(&coll, index).unwrap();
            let FileRef::Font(font) = FileRef::new(&bytes).unwrap() else {
                panic!("member {index} extracted as a collection");
            };
            for tag in [HEAD, MAXP, NAME, OS2] {
                assert_eq!(
                    font.table_data(tag).map(|data| data.as_bytes().to_vec()),
                    coll.table_data(index, tag).map(|data| {
                        // head differs only by checkSumAdjustment
                        let mut data = data.to_vec();
                        if tag == HEAD {
                            data[8..12].copy_from_slice(
                                &font.table_data(HEAD).unwrap().as_bytes()[8..12],
                            );
                        }
                        data
                    }),
                    "member {index} table {tag}"
                );
            }
            assert!(font.maxp().is_ok());
        }
    }

    #[test]
    fn out_of_range_index() {
        let err = extract_from_bytes(&fixture_bytes(), 2, ChecksumPolicy::Warn).unwrap_err();
        assert!(matches!(err, Error::MemberIndex { index: 2, count: 2 }));
        assert_eq!(
            err.to_string(),
            "specify a font number between 0 and 1 (inclusive), got 2"
        );
    }

    #[test]
    fn output_names_do_not_clobber() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("Lobster.ttc");
        let first = output_path(&input, None, Some(1), "ttf", false);
        assert_eq!(first, dir.path().join("Lobster#1.ttf"));
        std::fs::write(&first, b"").unwrap();

        let second = output_path(&input, None, Some(1), "ttf", false);
        assert_eq!(second, dir.path().join("Lobster#1#1.ttf"));
        assert_eq!(output_path(&input, None, Some(1), "ttf", true), first);
        assert_eq!(
            output_path(&input, None, None, "ttx", false),
            dir.path().join("Lobster.ttx")
        );
    }

    #[test]
    fn output_dir_replaces_input_dir() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();
        let input = dir.path().join("Lobster.ttc");
        assert_eq!(
            output_path(&input, Some(&out_dir), Some(0), "ttf", false),
            out_dir.join("Lobster#0.ttf")
        );
    }
}
