//! The work behind `ttcx`: extraction and conversion between files

use std::{fs, path::Path};

use fontcoll::{extract, ttx, ChecksumPolicy, Collection, Error, FileKind};
use log::{debug, info};

/// Which way a conversion goes, decided by the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    /// binary collection to text
    ToText,
    /// text to binary collection
    ToBinary,
}

impl Conversion {
    pub fn detect(bytes: &[u8]) -> Result<Conversion, Error> {
        match FileKind::sniff(bytes) {
            FileKind::Collection => Ok(Conversion::ToText),
            FileKind::Text => Ok(Conversion::ToBinary),
            FileKind::Font | FileKind::Unknown => Err(Error::NotACollection),
        }
    }

    /// The extension of the output.
    pub fn extension(&self) -> &'static str {
        match self {
            Conversion::ToText => "ttx",
            Conversion::ToBinary => "ttc",
        }
    }
}

pub fn read_input(input: &Path) -> Result<Vec<u8>, Error> {
    fs::read(input).map_err(|source| Error::FileIo {
        path: input.to_path_buf(),
        source,
    })
}

fn write_output(out: &Path, data: &[u8]) -> Result<(), Error> {
    fs::write(out, data).map_err(|source| Error::FileIo {
        path: out.to_path_buf(),
        source,
    })
}

/// Write member `index` of the collection at `input` to `out` as a standalone font.
pub fn extract_member(
    input: &Path,
    index: usize,
    out: &Path,
    checksums: ChecksumPolicy,
) -> Result<(), Error> {
    let bytes = read_input(input)?;
    let font = extract::extract_from_bytes(&bytes, index, checksums)?;
    write_output(out, &font)?;
    info!("wrote {} ({} bytes)", out.display(), font.len());
    Ok(())
}

/// Convert `input` to text or to binary, whichever it is not, and write it to `out`.
pub fn convert(input: &Path, out: &Path, checksums: ChecksumPolicy) -> Result<Conversion, Error> {
    let bytes = read_input(input)?;
    let conversion = Conversion::detect(&bytes)?;
    debug!("{} is converted {conversion:?}", input.display());
    let output = match conversion {
        Conversion::ToText => {
            let collection = Collection::from_bytes(&bytes, checksums)?;
            ttx::to_text(&collection)?.into_bytes()
        }
        Conversion::ToBinary => {
            let text = String::from_utf8_lossy(&bytes);
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
            ttx::from_text(text)?.to_bytes()?
        }
    };
    write_output(out, &output)?;
    info!("wrote {} ({} bytes)", out.display(), output.len());
    Ok(conversion)
}
