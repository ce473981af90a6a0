//! A ttx-style XML representation of collections.
//!
//! Tables are not decompiled: each is dumped as `hexdata`, or as an empty
//! element with a `reuse_from` attribute when it is shared with an earlier
//! member. The output is deterministic and tables are read in the order a
//! binary layout gives them, so converting text to binary and back to text
//! reproduces the text of the first parse.

use std::{fmt::Write, path::Path};

use log::debug;
use quick_xml::{
    escape::escape,
    events::{BytesStart, Event},
    Reader,
};
use write_fonts::types::Tag;

use crate::{Collection, Error, Member, Table, TableData, TtcVersion};

const HEX_BYTES_PER_LINE: usize = 16;
const TTC_SFNT_VERSION: &str = "ttcf";

#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("error parsing XML: '{0}'")]
    Xml(#[from] quick_xml::Error),
    #[error("error parsing XML attribute: '{0}'")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("failed to format text: '{0}'")]
    Format(#[from] std::fmt::Error),
    #[error("illegal root tag '{0}'")]
    IllegalRoot(String),
    #[error("not a font collection: the root <ttFont> must have sfntVersion=\"ttcf\"")]
    NotACollection,
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[error("invalid sfntVersion '{0}'")]
    SfntVersion(String),
    #[error("invalid ttcVersion '{0}'")]
    TtcVersion(String),
    #[error("'{0}' is not a valid table element name")]
    TableName(String),
    #[error("table '{tag}' has an illegal reuse_from '{value}'")]
    ReuseFrom { tag: Tag, value: String },
    #[error("table '{tag}' has malformed hexdata: '{source}'")]
    Hex {
        tag: Tag,
        #[source]
        source: hex::FromHexError,
    },
}

/// Dump a collection as text.
pub fn to_text(collection: &Collection) -> Result<String, Error> {
    collection.validate()?;
    let mut out = String::new();
    write_collection(&mut out, collection).map_err(TextError::from)?;
    Ok(out)
}

/// Parse text produced by [`to_text`] (or written by hand in the same shape).
///
/// Shared tables are moved ahead of owned ones, see [`Collection::sort_tables`].
pub fn from_text(text: &str) -> Result<Collection, Error> {
    let mut collection = parse_collection(text)?;
    collection.validate()?;
    collection.sort_tables();
    Ok(collection)
}

pub fn write_text(collection: &Collection, path: &Path) -> Result<(), Error> {
    let text = to_text(collection)?;
    std::fs::write(path, text).map_err(Error::file_io(path))
}

pub fn read_text(path: &Path) -> Result<Collection, Error> {
    let text = std::fs::read_to_string(path).map_err(Error::file_io(path))?;
    from_text(&text)
}

fn write_collection(out: &mut String, collection: &Collection) -> std::fmt::Result {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(
        out,
        "<ttFont sfntVersion=\"{TTC_SFNT_VERSION}\" ttcVersion=\"{}\">",
        format_ttc_version(collection.version)
    )?;
    for member in &collection.members {
        writeln!(out)?;
        writeln!(
            out,
            "  <ttFont sfntVersion=\"{}\">",
            escape(&format_sfnt_version(member.sfnt_version))
        )?;
        for table in &member.tables {
            let name = tag_to_xml(table.tag);
            match &table.data {
                TableData::Shared { from } => writeln!(out, "    <{name} reuse_from=\"{from}\"/>")?,
                TableData::Owned(data) if data.is_empty() => {
                    writeln!(out, "    <{name} raw=\"True\"/>")?
                }
                TableData::Owned(data) => {
                    writeln!(out, "    <{name} raw=\"True\">")?;
                    writeln!(out, "      <hexdata>")?;
                    for line in data.chunks(HEX_BYTES_PER_LINE) {
                        let words = line.chunks(4).map(hex::encode).collect::<Vec<_>>();
                        writeln!(out, "        {}", words.join(" "))?;
                    }
                    writeln!(out, "      </hexdata>")?;
                    writeln!(out, "    </{name}>")?;
                }
            }
        }
        writeln!(out, "  </ttFont>")?;
    }
    writeln!(out)?;
    writeln!(out, "</ttFont>")
}

fn parse_collection(text: &str) -> Result<Collection, TextError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let root = match next_event(&mut reader)? {
        Event::Start(start) => start,
        other => {
            return Err(TextError::IllegalRoot(describe(&other)));
        }
    };
    if root.name().as_ref() != b"ttFont" {
        return Err(TextError::IllegalRoot(element_name(&root)));
    }

    let mut sfnt_version = None;
    let mut version = TtcVersion::V1;
    for attr in root.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"sfntVersion" => sfnt_version = Some(value.into_owned()),
            b"ttcVersion" => version = parse_ttc_version(&value)?,
            // ttLibVersion and friends
            _ => (),
        }
    }
    if sfnt_version.as_deref() != Some(TTC_SFNT_VERSION) {
        return Err(TextError::NotACollection);
    }

    let mut members = Vec::new();
    loop {
        match next_event(&mut reader)? {
            Event::Start(start) if start.name().as_ref() == b"ttFont" => {
                let member = parse_member(&mut reader, &start)?;
                debug!("parsed member {} with {} tables", members.len(), member.tables.len());
                members.push(member);
            }
            Event::Empty(start) if start.name().as_ref() == b"ttFont" => {
                members.push(Member::new(member_sfnt_version(&start)?, Vec::new()));
            }
            Event::End(end) if end.name().as_ref() == b"ttFont" => break,
            other => return Err(unexpected("<ttFont> or </ttFont>", &other)),
        }
    }
    match next_event(&mut reader)? {
        Event::Eof => Ok(Collection::new(version, members)),
        other => Err(unexpected("end of document", &other)),
    }
}

fn parse_member(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Member, TextError> {
    let sfnt_version = member_sfnt_version(start)?;
    let mut tables = Vec::new();
    loop {
        match next_event(reader)? {
            Event::Empty(element) => {
                let tag = xml_to_tag(&element_name(&element))?;
                let table = match reuse_from(tag, &element)? {
                    Some(from) => Table::shared(tag, from),
                    None => Table::owned(tag, Vec::new()),
                };
                tables.push(table);
            }
            Event::Start(element) => {
                let name = element_name(&element);
                let tag = xml_to_tag(&name)?;
                let table = match reuse_from(tag, &element)? {
                    Some(from) => {
                        expect_end(reader, &name)?;
                        Table::shared(tag, from)
                    }
                    None => Table::owned(tag, parse_table_body(reader, tag, &name)?),
                };
                tables.push(table);
            }
            Event::End(end) if end.name().as_ref() == b"ttFont" => break,
            other => return Err(unexpected("a table or </ttFont>", &other)),
        }
    }
    Ok(Member::new(sfnt_version, tables))
}

fn parse_table_body(
    reader: &mut Reader<&[u8]>,
    tag: Tag,
    name: &str,
) -> Result<Vec<u8>, TextError> {
    let mut data = Vec::new();
    loop {
        match next_event(reader)? {
            Event::Start(element) if element.name().as_ref() == b"hexdata" => loop {
                match next_event(reader)? {
                    Event::Text(text) => {
                        let digits = text
                            .unescape()?
                            .chars()
                            .filter(|c| !c.is_whitespace())
                            .collect::<String>();
                        let bytes =
                            hex::decode(digits).map_err(|source| TextError::Hex { tag, source })?;
                        data.extend(bytes);
                    }
                    Event::End(end) if end.name().as_ref() == b"hexdata" => break,
                    other => return Err(unexpected("hex digits or </hexdata>", &other)),
                }
            },
            Event::Empty(element) if element.name().as_ref() == b"hexdata" => (),
            Event::End(end) if end.name().as_ref() == name.as_bytes() => return Ok(data),
            other => return Err(unexpected("<hexdata> or the end of the table", &other)),
        }
    }
}

fn expect_end(reader: &mut Reader<&[u8]>, name: &str) -> Result<(), TextError> {
    match next_event(reader)? {
        Event::End(end) if end.name().as_ref() == name.as_bytes() => Ok(()),
        other => Err(unexpected("the end of a reused table", &other)),
    }
}

fn member_sfnt_version(start: &BytesStart) -> Result<u32, TextError> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"sfntVersion" {
            return parse_sfnt_version(&attr.unescape_value()?);
        }
    }
    // ttx omits nothing here, but a bare <ttFont> is a TrueType font
    Ok(0x0001_0000)
}

fn reuse_from(tag: Tag, element: &BytesStart) -> Result<Option<usize>, TextError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"reuse_from" {
            let value = attr.unescape_value()?;
            return value
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| TextError::ReuseFrom {
                    tag,
                    value: value.into_owned(),
                });
        }
    }
    Ok(None)
}

/// The next event that matters, skipping declarations and comments.
fn next_event<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Event<'a>, TextError> {
    loop {
        match reader.read_event()? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => (),
            event => return Ok(event),
        }
    }
}

fn element_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

fn describe(event: &Event) -> String {
    match event {
        Event::Start(start) => format!("<{}>", element_name(start)),
        Event::Empty(start) => format!("<{}/>", element_name(start)),
        Event::End(end) => format!("</{}>", String::from_utf8_lossy(end.name().as_ref())),
        Event::Text(_) | Event::CData(_) => "text".to_string(),
        Event::Eof => "end of document".to_string(),
        _ => "markup".to_string(),
    }
}

fn unexpected(expected: &'static str, found: &Event) -> TextError {
    TextError::Unexpected {
        expected,
        found: describe(found),
    }
}

fn format_ttc_version(version: TtcVersion) -> &'static str {
    match version {
        TtcVersion::V1 => "1.0",
        TtcVersion::V2 => "2.0",
    }
}

fn parse_ttc_version(value: &str) -> Result<TtcVersion, TextError> {
    match value.trim() {
        "1.0" | "1" => Ok(TtcVersion::V1),
        "2.0" | "2" => Ok(TtcVersion::V2),
        other => Err(TextError::TtcVersion(other.to_string())),
    }
}

/// Printable tags are written as-is, anything else as `\xNN` escapes.
fn format_sfnt_version(version: u32) -> String {
    let bytes = version.to_be_bytes();
    if bytes.iter().all(|b| is_plain(*b)) {
        bytes.iter().map(|b| *b as char).collect()
    } else {
        bytes.iter().map(|b| format!("\\x{b:02x}")).collect()
    }
}

fn parse_sfnt_version(value: &str) -> Result<u32, TextError> {
    let err = || TextError::SfntVersion(value.to_string());
    if value.len() == 4 && value.bytes().all(is_plain) {
        let bytes: [u8; 4] = value.as_bytes().try_into().map_err(|_| err())?;
        return Ok(u32::from_be_bytes(bytes));
    }
    let mut bytes = Vec::with_capacity(4);
    let mut rest = value;
    while !rest.is_empty() {
        let escaped = rest.strip_prefix("\\x").ok_or_else(err)?;
        let digits = escaped.get(..2).ok_or_else(err)?;
        bytes.push(u8::from_str_radix(digits, 16).map_err(|_| err())?);
        rest = &escaped[2..];
    }
    let bytes: [u8; 4] = bytes.try_into().map_err(|_| err())?;
    Ok(u32::from_be_bytes(bytes))
}

fn is_plain(byte: u8) -> bool {
    (byte.is_ascii_graphic() || byte == b' ') && byte != b'\\'
}

/// The element name used for a table.
///
/// 'OS/2' becomes `OS_2`; tags that are identifiers once trailing spaces are
/// dropped are used directly; anything else is `_` plus eight hex digits.
pub fn tag_to_xml(tag: Tag) -> String {
    let bytes = tag.to_be_bytes();
    if &bytes == b"OS/2" {
        return "OS_2".to_string();
    }
    let trimmed = String::from_utf8_lossy(&bytes).trim_end_matches(' ').to_string();
    if &bytes != b"OS_2" && is_identifier(&trimmed) {
        trimmed
    } else {
        format!("_{}", hex::encode(bytes))
    }
}

/// The inverse of [`tag_to_xml`].
pub fn xml_to_tag(name: &str) -> Result<Tag, TextError> {
    let err = || TextError::TableName(name.to_string());
    if name == "OS_2" {
        return Ok(Tag::new(b"OS/2"));
    }
    if let Some(digits) = name.strip_prefix('_').filter(|d| d.len() == 8) {
        if let Ok(bytes) = hex::decode(digits) {
            let bytes: [u8; 4] = bytes.try_into().map_err(|_| err())?;
            return Ok(Tag::from_be_bytes(bytes));
        }
    }
    if name.is_empty() || name.len() > 4 || !is_identifier(name) {
        return Err(err());
    }
    let mut bytes = [b' '; 4];
    bytes[..name.len()].copy_from_slice(name.as_bytes());
    Ok(Tag::new(&bytes))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        test_helpers::{fixture_collection, OS2, TRUETYPE},
        ChecksumPolicy,
    };

    const CVT: Tag = Tag::new(b"cvt ");

    fn small_collection() -> Collection {
        Collection::new(
            TtcVersion::V1,
            vec![
                Member::new(
                    TRUETYPE,
                    vec![
                        Table::owned(CVT, (0u8..20).collect::<Vec<_>>()),
                        Table::owned(OS2, Vec::new()),
                    ],
                ),
                Member::new(
                    u32::from_be_bytes(*b"OTTO"),
                    vec![
                        Table::shared(CVT, 0),
                        Table::owned(Tag::new(b"a b "), vec![0xff]),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn text_layout() {
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<ttFont sfntVersion="ttcf" ttcVersion="1.0">

  <ttFont sfntVersion="\x00\x01\x00\x00">
    <cvt raw="True">
      <hexdata>
        00010203 04050607 08090a0b 0c0d0e0f
        10111213
      </hexdata>
    </cvt>
    <OS_2 raw="True"/>
  </ttFont>

  <ttFont sfntVersion="OTTO">
    <cvt reuse_from="0"/>
    <_61206220 raw="True">
      <hexdata>
        ff
      </hexdata>
    </_61206220>
  </ttFont>

</ttFont>
"#;
        assert_eq!(to_text(&small_collection()).unwrap(), expected);
        assert_eq!(from_text(expected).unwrap(), small_collection());
    }

    #[test]
    fn fixture_round_trips_through_text() {
        let coll = fixture_collection();
        let text = to_text(&coll).unwrap();
        assert_eq!(from_text(&text).unwrap(), coll);
    }

    #[test]
    fn text_is_stable_across_a_binary_round_trip() {
        let text = to_text(&fixture_collection()).unwrap();
        let binary = from_text(&text).unwrap().to_bytes().unwrap();
        let again = to_text(&Collection::from_bytes(&binary, ChecksumPolicy::Error).unwrap())
            .unwrap();
        assert_eq!(again, text);
    }

    #[test]
    fn share_listed_after_owned_table_is_stable() {
        let _ = env_logger::builder().is_test(true).try_init();
        let text = r#"<ttFont sfntVersion="ttcf">
  <ttFont sfntVersion="OTTO">
    <head raw="True"><hexdata>00010000</hexdata></head>
    <maxp raw="True"><hexdata>00005000 0001</hexdata></maxp>
  </ttFont>
  <ttFont sfntVersion="OTTO">
    <head raw="True"><hexdata>00018000</hexdata></head>
    <maxp reuse_from="0"/>
  </ttFont>
</ttFont>"#;
        let coll = from_text(text).unwrap();
        assert_eq!(
            coll.members[1].tags().collect::<Vec<_>>(),
            vec![Tag::new(b"maxp"), Tag::new(b"head")]
        );

        let first = to_text(&coll).unwrap();
        let binary = coll.to_bytes().unwrap();
        let again = to_text(&Collection::from_bytes(&binary, ChecksumPolicy::Error).unwrap())
            .unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn v2_header_survives() {
        let mut coll = small_collection();
        coll.version = TtcVersion::V2;
        let text = to_text(&coll).unwrap();
        assert!(text.contains("ttcVersion=\"2.0\""));
        assert_eq!(from_text(&text).unwrap().version, TtcVersion::V2);
    }

    #[rstest]
    #[case(b"OS/2", "OS_2")]
    #[case(b"head", "head")]
    #[case(b"cvt ", "cvt")]
    #[case(b"a b ", "_61206220")]
    #[case(b"OS_2", "_4f535f32")]
    #[case(b"1abc", "_31616263")]
    fn tag_names(#[case] tag: &[u8; 4], #[case] name: &str) {
        let tag = Tag::new(tag);
        assert_eq!(tag_to_xml(tag), name);
        assert_eq!(xml_to_tag(name).unwrap(), tag);
    }

    #[rstest]
    #[case("")]
    #[case("toolong")]
    #[case("a-b")]
    #[case("_zzzzzzzz")]
    fn bad_table_names(#[case] name: &str) {
        assert!(matches!(xml_to_tag(name), Err(TextError::TableName(_))));
    }

    #[rstest]
    #[case("OTTO", 0x4F54_544F)]
    #[case("true", 0x7472_7565)]
    #[case("\\x00\\x01\\x00\\x00", 0x0001_0000)]
    fn sfnt_versions(#[case] text: &str, #[case] value: u32) {
        assert_eq!(parse_sfnt_version(text).unwrap(), value);
        assert_eq!(format_sfnt_version(value), text);
    }

    #[rstest]
    #[case("\\x00\\x01")]
    #[case("\\x0")]
    #[case("OT")]
    #[case("\\xzz\\x00\\x00\\x00")]
    fn bad_sfnt_versions(#[case] text: &str) {
        assert!(matches!(
            parse_sfnt_version(text),
            Err(TextError::SfntVersion(_))
        ));
    }

    fn text_error(text: &str) -> TextError {
        match from_text(text) {
            Err(Error::Text(err)) => err,
            other => panic!("expected a text error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_root() {
        assert!(matches!(
            text_error("<font/>"),
            TextError::IllegalRoot(name) if name == "<font/>"
        ));
        assert!(matches!(
            text_error("<font></font>"),
            TextError::IllegalRoot(name) if name == "font"
        ));
    }

    #[test]
    fn single_font_text_is_rejected() {
        let text = r#"<ttFont sfntVersion="\x00\x01\x00\x00"><head raw="True"/></ttFont>"#;
        assert!(matches!(text_error(text), TextError::NotACollection));
    }

    #[test]
    fn bad_hex() {
        let text = r#"<ttFont sfntVersion="ttcf">
  <ttFont sfntVersion="OTTO">
    <head raw="True"><hexdata>0001 02zz</hexdata></head>
  </ttFont>
</ttFont>"#;
        assert!(matches!(
            text_error(text),
            TextError::Hex { tag, .. } if tag == Tag::new(b"head")
        ));
    }

    #[test]
    fn bad_reuse_from() {
        let text = r#"<ttFont sfntVersion="ttcf">
  <ttFont sfntVersion="OTTO"><head reuse_from="first"/></ttFont>
</ttFont>"#;
        assert!(matches!(text_error(text), TextError::ReuseFrom { .. }));
    }

    #[test]
    fn forward_reuse_is_invalid() {
        let text = r#"<ttFont sfntVersion="ttcf">
  <ttFont sfntVersion="OTTO"><head reuse_from="1"/></ttFont>
  <ttFont sfntVersion="OTTO"><head raw="True"/></ttFont>
</ttFont>"#;
        assert!(matches!(
            from_text(text),
            Err(Error::InvalidShare { member: 0, from: 1, .. })
        ));
    }

    #[test]
    fn trailing_content_is_rejected() {
        let text = r#"<ttFont sfntVersion="ttcf"><ttFont/></ttFont><ttFont/>"#;
        assert!(matches!(
            text_error(text),
            TextError::Unexpected { expected: "end of document", .. }
        ));
    }

    #[test]
    fn comments_and_declarations_are_skipped() {
        let text = r#"<?xml version="1.0"?>
<!-- dumped by hand -->
<ttFont sfntVersion="ttcf" ttLibVersion="3.0">
  <!-- regular -->
  <ttFont sfntVersion="true">
    <maxp raw="True">
      <hexdata>00005000 0001</hexdata>
    </maxp>
  </ttFont>
</ttFont>"#;
        let coll = from_text(text).unwrap();
        assert_eq!(coll.members[0].sfnt_version, u32::from_be_bytes(*b"true"));
        assert_eq!(
            coll.table_data(0, Tag::new(b"maxp")),
            Some(&[0, 0, 0x50, 0, 0, 1][..])
        );
    }
}
