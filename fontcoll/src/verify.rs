//! Structural checks on a binary collection

use std::fmt::Display;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use skrifa::{string::StringId, MetadataProvider};
use write_fonts::{
    read::{FileRef, TableProvider},
    types::Tag,
};

use crate::{extract::extract, ChecksumPolicy, Collection, Error};

/// What a collection is expected to look like.
///
/// Every field is optional in YAML; a missing `required_tables` means
/// 'head' and 'maxp'.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectations {
    pub member_count: Option<usize>,
    /// The OS/2 version every member must have
    pub os2_version: Option<u16>,
    #[serde(with = "tag_list")]
    pub required_tables: Vec<Tag>,
    /// Tables that every member after the first must take from an earlier one
    #[serde(with = "tag_list")]
    pub shared_tables: Vec<Tag>,
    pub min_shared: Option<usize>,
}

impl Default for Expectations {
    fn default() -> Self {
        Expectations {
            member_count: None,
            os2_version: None,
            required_tables: vec![Tag::new(b"head"), Tag::new(b"maxp")],
            shared_tables: Vec::new(),
            min_shared: None,
        }
    }
}

/// One failed check. `member` is `None` for collection-wide problems.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub member: Option<usize>,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Members found, zero if the input could not be read
    pub members: usize,
    pub findings: Vec<Finding>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }

    fn push(&mut self, member: Option<usize>, message: impl Into<String>) {
        let finding = Finding {
            member,
            message: message.into(),
        };
        debug!("{finding}");
        self.findings.push(finding);
    }
}

/// Check `bytes` against `expectations`, collecting every problem found.
///
/// Under [`ChecksumPolicy::Error`] a table checksum mismatch makes the
/// collection unreadable, which is a finding.
pub fn verify(
    bytes: &[u8],
    expectations: &Expectations,
    checksums: ChecksumPolicy,
) -> VerificationReport {
    let mut report = VerificationReport::default();
    let collection = match Collection::from_bytes(bytes, checksums) {
        Ok(collection) => collection,
        Err(e) => {
            report.push(None, format!("not a readable font collection: {e}"));
            return report;
        }
    };
    report.members = collection.len();
    info!("verifying a collection of {} fonts", collection.len());

    if let Some(expected) = expectations.member_count {
        if collection.len() != expected {
            report.push(
                None,
                format!("expected {expected} fonts, found {}", collection.len()),
            );
        }
    }

    for (index, member) in collection.members.iter().enumerate() {
        for tag in &expectations.required_tables {
            if member.table(*tag).is_none() {
                report.push(Some(index), format!("missing required table '{tag}'"));
            }
        }
        if index > 0 {
            for tag in &expectations.shared_tables {
                match member.table(*tag) {
                    Some(table) if table.is_shared() => (),
                    Some(_) => report.push(Some(index), format!("'{tag}' is not shared")),
                    None => report.push(Some(index), format!("no '{tag}' table to share")),
                }
            }
        }
        check_standalone(&collection, index, expectations, &mut report);
    }

    if let Some(min) = expectations.min_shared {
        let shared = collection.shared_count();
        if shared < min {
            report.push(
                None,
                format!("expected at least {min} shared tables, found {shared}"),
            );
        }
    }
    report
}

/// Extract a member and make sure it reads back as a font on its own.
fn check_standalone(
    collection: &Collection,
    index: usize,
    expectations: &Expectations,
    report: &mut VerificationReport,
) {
    let bytes = match extract(collection, index) {
        Ok(bytes) => bytes,
        Err(e) => {
            report.push(Some(index), format!("extraction failed: {e}"));
            return;
        }
    };
    let font = match FileRef::new(&bytes) {
        Ok(FileRef::Font(font)) => font,
        Ok(FileRef::Collection(_)) => {
            report.push(Some(index), "extracted as a collection");
            return;
        }
        Err(e) => {
            report.push(Some(index), format!("extracted font does not parse: {e}"));
            return;
        }
    };
    let Some(expected) = expectations.os2_version else {
        return;
    };
    match font.os2() {
        Ok(os2) if os2.version() == expected => (),
        Ok(os2) => report.push(
            Some(index),
            format!("expected OS/2 version {expected}, found {}", os2.version()),
        ),
        Err(e) => report.push(Some(index), format!("no readable OS/2 table: {e}")),
    }
}

/// A line of `ttc-verify -v` output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberSummary {
    pub index: usize,
    pub family: Option<String>,
    pub tables: Vec<Tag>,
    pub shared: Vec<Tag>,
}

/// Summarize each member: family name and table tags.
pub fn describe(bytes: &[u8]) -> Result<Vec<MemberSummary>, Error> {
    let collection = Collection::from_bytes(bytes, ChecksumPolicy::Ignore)?;
    Ok(collection
        .members
        .iter()
        .enumerate()
        .map(|(index, member)| MemberSummary {
            index,
            family: family_name(bytes, index),
            tables: member.tags().collect(),
            shared: member
                .tables
                .iter()
                .filter(|table| table.is_shared())
                .map(|table| table.tag)
                .collect(),
        })
        .collect())
}

fn family_name(bytes: &[u8], index: usize) -> Option<String> {
    let font = skrifa::FontRef::from_index(bytes, index as u32).ok()?;
    font.localized_strings(StringId::FAMILY_NAME)
        .english_or_first()
        .map(|name| name.to_string())
}

impl Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.member {
            Some(member) => write!(f, "font {member}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl Display for MemberSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} '{}':",
            self.index,
            self.family.as_deref().unwrap_or("<unnamed>")
        )?;
        for tag in &self.tables {
            write!(f, " {tag}")?;
            if self.shared.contains(tag) {
                f.write_str("*")?;
            }
        }
        Ok(())
    }
}

/// Parse a tag the way it is written in config files: up to four
/// characters, padded with spaces.
pub fn parse_tag(s: &str) -> Result<Tag, String> {
    Tag::new_checked(s.as_bytes()).map_err(|e| format!("invalid tag '{s}': {e}"))
}

/// Tags as plain strings, rather than the byte arrays of `Tag`'s own serde.
mod tag_list {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use write_fonts::types::Tag;

    pub fn serialize<S: Serializer>(tags: &[Tag], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(tags.iter().map(|tag| tag.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Tag>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| super::parse_tag(s).map_err(D::Error::custom))
            .collect()
    }
}
