//! Template to document conversion.
//!
//! A `.potx` and a `.pptx` differ only in the main part's content type in
//! `[Content_Types].xml`. Converting copies the archive entry by entry,
//! rewriting that one string in the manifest. Every other entry is copied
//! raw, so its compressed bytes, compression method and order are unchanged.

use deck_core::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::opc::{content_type, CONTENT_TYPES_PART};

/// What a conversion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Entries written to the destination.
    pub entries: usize,
    /// Whether the manifest declared a template and was rewritten.
    pub manifest_rewritten: bool,
}

/// Convert a template package at `source` into an editable presentation at
/// `destination`.
pub fn convert_template(source: &Path, destination: &Path) -> Result<ConversionSummary> {
    if !source.exists() {
        return Err(Error::TemplateNotFound(source.to_path_buf()));
    }

    let reader = BufReader::new(File::open(source)?);
    let writer = BufWriter::new(File::create(destination)?);
    let (summary, mut writer) = convert_template_stream(reader, writer)?;
    writer.flush()?;

    log::debug!(
        "Converted {} -> {} ({} entries, manifest rewritten: {})",
        source.display(),
        destination.display(),
        summary.entries,
        summary.manifest_rewritten
    );
    Ok(summary)
}

/// Stream form of [`convert_template`].
pub fn convert_template_stream<R, W>(reader: R, writer: W) -> Result<(ConversionSummary, W)>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| Error::ZipError(format!("Failed to open template: {}", e)))?;
    let mut zip = ZipWriter::new(writer);
    let mut manifest_rewritten = false;

    for i in 0..archive.len() {
        let is_manifest = archive
            .by_index_raw(i)
            .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?
            .name()
            == CONTENT_TYPES_PART;

        if is_manifest {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read manifest: {}", e)))?;
            let options = FileOptions::default()
                .compression_method(file.compression())
                .last_modified_time(file.last_modified());
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            drop(file);

            let (data, replaced) = replace_bytes(
                &data,
                content_type::TEMPLATE_MAIN.as_bytes(),
                content_type::PRESENTATION_MAIN.as_bytes(),
            );
            manifest_rewritten |= replaced;

            zip.start_file(CONTENT_TYPES_PART, options)
                .map_err(|e| Error::ZipError(format!("Failed to write manifest: {}", e)))?;
            zip.write_all(&data)?;
        } else {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
            let name = file.name().to_string();
            zip.raw_copy_file(file)
                .map_err(|e| Error::ZipError(format!("Failed to copy '{}': {}", name, e)))?;
        }
    }

    let entries = archive.len();
    let writer = zip
        .finish()
        .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;

    Ok((
        ConversionSummary {
            entries,
            manifest_rewritten,
        },
        writer,
    ))
}

/// Replace every occurrence of `from` with `to`.
fn replace_bytes(data: &[u8], from: &[u8], to: &[u8]) -> (Vec<u8>, bool) {
    let mut out = Vec::with_capacity(data.len() + to.len());
    let mut replaced = false;
    let mut i = 0;

    while i < data.len() {
        if data[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
            replaced = true;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }

    (out, replaced)
}
