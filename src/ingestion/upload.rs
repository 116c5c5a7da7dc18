//! Uploaded-file handle and the scoped stream rewind used by ingestion.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// A named, seekable byte stream supplied by the host for one ingestion call.
///
/// The ingestor borrows the handle mutably and never retains it. After [`crate::ingestion::ingest`]
/// returns, the stream's cursor is back at the start.
pub struct UploadedFile<R> {
    name: String,
    reader: R,
}

impl<R: Read + Seek> UploadedFile<R> {
    /// Wrap an existing reader under the given file name.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }

    /// File name as reported by the host (may include a directory part).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased extension of the base name, without the dot.
    ///
    /// Mirrors a plain "ends with `.ext`" check, so `".csv"` has extension `csv` and a trailing
    /// dot yields no extension.
    pub fn extension(&self) -> Option<String> {
        let base = self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name);
        match base.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Some(ext.to_ascii_lowercase()),
            _ => None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Give the stream back to the host.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl UploadedFile<Cursor<Vec<u8>>> {
    /// In-memory upload, the common shape for bytes received from a web form.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, Cursor::new(bytes.into()))
    }
}

impl UploadedFile<File> {
    /// Open a local file, using its base name as the upload name.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, File::open(path)?))
    }
}

impl<R> fmt::Debug for UploadedFile<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Positions the wrapped stream at the start, and seeks back there again when dropped.
///
/// Use [`Rewind::finish`] on the happy path to surface a failing seek; the drop fallback can only
/// log it.
pub(crate) struct Rewind<'a, R: Seek> {
    stream: &'a mut R,
    armed: bool,
}

impl<'a, R: Seek> Rewind<'a, R> {
    pub(crate) fn start(stream: &'a mut R) -> io::Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        Ok(Self {
            stream,
            armed: true,
        })
    }

    pub(crate) fn finish(mut self) -> io::Result<()> {
        self.armed = false;
        self.stream.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl<R: Seek> Deref for Rewind<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.stream
    }
}

impl<R: Seek> DerefMut for Rewind<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.stream
    }
}

impl<R: Seek> Drop for Rewind<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.stream.seek(SeekFrom::Start(0)) {
                tracing::warn!(error = %e, "failed to rewind upload stream");
            }
        }
    }
}

/// Read up to `limit` bytes (or everything) from the current position.
pub(crate) fn read_bytes<R: Read>(reader: &mut R, limit: Option<usize>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match limit {
        Some(n) => {
            reader.by_ref().take(n as u64).read_to_end(&mut buf)?;
        }
        None => {
            reader.read_to_end(&mut buf)?;
        }
    }
    Ok(buf)
}
