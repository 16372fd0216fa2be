//! All-or-nothing writes of gzip-compressed output files.
//!
//! Every page manrender produces goes through [`write_atomically`]. The
//! payload is streamed into a gzip encoder that writes to a temporary file in
//! the destination's directory; only after the producer succeeded and the
//! encoder and buffer were flushed is the file renamed over the destination.
//! The rename is the single step that changes what readers observe, and
//! because the temporary file lives in the same directory it never crosses a
//! filesystem boundary.
//!
//! Decompression costs the same regardless of level, so outputs are always
//! compressed at the best level once, at render time.
//!
//! If anything fails before the rename, the temporary file is removed when
//! its [`TempPath`](tempfile::TempPath) is dropped and the destination keeps
//! its previous content and modification time.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Prefix for staged files, so leftovers from a killed process are easy to
/// spot and clean up.
pub const TEMP_PREFIX: &str = ".manrender-";

/// Stream a payload into a gzip-compressed file at `dest`.
///
/// `produce` receives the uncompressed sink. The destination is replaced
/// only if `produce` returns `Ok` and every subsequent flush, permission
/// change and rename succeeds.
pub fn write_atomically<F, E>(dest: &Path, produce: F) -> Result<(), E>
where
    F: FnOnce(&mut dyn Write) -> Result<(), E>,
    E: From<io::Error>,
{
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    let (file, temp_path) = staged.into_parts();

    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    produce(&mut encoder)?;

    let buffered = encoder.finish()?;
    let file = buffered.into_inner().map_err(|e| e.into_error())?;
    set_world_readable(&file)?;
    drop(file);

    temp_path.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_world_readable(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_world_readable(_file: &File) -> io::Result<()> {
    Ok(())
}
