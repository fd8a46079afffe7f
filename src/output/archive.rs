//! ZIP bundling of export payloads

use crate::error::Result;
use crate::output::formatter::ExportPayload;
use log::info;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry path of a payload inside the archive, e.g. `markdown/moon_tale.md`.
pub fn entry_name(payload: &ExportPayload) -> String {
    format!("{}/{}", payload.format.folder(), payload.filename)
}

/// Write all payloads into `writer` as a deflated ZIP archive and return the writer.
pub fn build_archive<W: Write + Seek>(writer: W, payloads: &[ExportPayload]) -> Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    for payload in payloads {
        zip.start_file(entry_name(payload), options)?;
        zip.write_all(payload.content.as_bytes())?;
    }

    Ok(zip.finish()?)
}

pub fn write_archive(path: &Path, payloads: &[ExportPayload]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    build_archive(file, payloads)?;
    info!("Wrote {} file(s) to archive {}", payloads.len(), path.display());
    Ok(())
}
