//! Zip assembly for the batch's converted files.
//!
//! The archive is built fully in memory before the HTTP boundary commits
//! any response header. Batches are capped at 20 files, so the buffer is
//! bounded, and an assembly failure can always be reported as a structured
//! JSON error instead of a truncated binary stream.

use crate::error::ConvertError;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Reduce a filename to its final component for use as an archive entry.
///
/// Strips path components like `../` so a crafted name cannot place an
/// entry outside the extraction directory.
fn sanitize_entry_name(name: &str, fallback: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Assemble `(name, bytes)` entries into a zip archive.
///
/// Every input entry appears exactly once under its (sanitised) name, in
/// input order, compressed with deflate.
pub fn assemble(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>, ConvertError> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut writer = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (i, (name, bytes)) in entries.iter().enumerate() {
            let entry_name = sanitize_entry_name(name, &format!("unnamed_{i}"));
            writer
                .start_file(&entry_name, options)
                .map_err(|e| ConvertError::Archive(format!("entry '{entry_name}': {e}")))?;
            writer
                .write_all(bytes)
                .map_err(|e| ConvertError::Archive(format!("entry '{entry_name}': {e}")))?;
        }

        writer
            .finish()
            .map_err(|e| ConvertError::Archive(format!("finalize: {e}")))?;
    }

    debug!(
        "Assembled archive: {} entries, {} bytes",
        entries.len(),
        buffer.len()
    );
    Ok(buffer)
}
