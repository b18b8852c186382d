//! Where the UPDATE.APP bytes come from.
//!
//! ```no_run
//! use update_app::source::ContainerSource;
//! use update_app::decoder::BlockStreamDecoder;
//! use update_app::sink::NullSink;
//!
//! let mut source = ContainerSource::open("update.zip")?;
//! let mut decoder = BlockStreamDecoder::new(source.stream()?);
//! decoder.run(&mut NullSink)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Entry name looked up inside update archives.
pub const DEFAULT_ENTRY_NAME: &str = "UPDATE.APP";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("archive error in {}: {source}", path.display())]
    Archive {
        path:   PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("{} has no entry named {entry}", path.display())]
    MissingEntry { path: PathBuf, entry: String },
    #[error("unsupported file extension: {} (expected .APP or .zip)", .0.display())]
    UnsupportedExtension(PathBuf),
}

enum Origin {
    Direct(BufReader<File>),
    Archive {
        archive: ZipArchive<BufReader<File>>,
        entry:   String,
    },
}

/// A single forward-only UPDATE.APP byte stream.
pub struct ContainerSource {
    path:   PathBuf,
    origin: Origin,
}

impl ContainerSource {
    /// Open a raw UPDATE.APP file.
    pub fn open_direct<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_owned();
        let file = open_file(&path)?;
        debug!("reading {} directly", path.display());
        Ok(Self { path, origin: Origin::Direct(BufReader::new(file)) })
    }

    /// Open a zip archive and check that `entry_name` is present.  The entry
    /// is decompressed lazily by [`ContainerSource::stream`].
    pub fn open_from_archive<P: AsRef<Path>>(path: P, entry_name: &str) -> Result<Self, SourceError> {
        let path = path.as_ref().to_owned();
        let file = open_file(&path)?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(|source| SourceError::Archive { path: path.clone(), source })?;
        if archive.index_for_name(entry_name).is_none() {
            return Err(SourceError::MissingEntry { path, entry: entry_name.to_owned() });
        }
        debug!("reading {} from {}", entry_name, path.display());
        Ok(Self {
            path,
            origin: Origin::Archive { archive, entry: entry_name.to_owned() },
        })
    }

    /// Pick the opener from the file extension: `.zip` opens the
    /// [`DEFAULT_ENTRY_NAME`] entry, `.app` is read directly.  Extensions are
    /// compared ignoring ASCII case.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        Self::open_with_entry(path, DEFAULT_ENTRY_NAME)
    }

    /// Like [`ContainerSource::open`] with a custom archive entry name.
    pub fn open_with_entry<P: AsRef<Path>>(path: P, entry_name: &str) -> Result<Self, SourceError> {
        let path = path.as_ref();
        match SourceKind::from_path(path) {
            Some(SourceKind::Archive) => Self::open_from_archive(path, entry_name),
            Some(SourceKind::Direct)  => Self::open_direct(path),
            None => Err(SourceError::UnsupportedExtension(path.to_owned())),
        }
    }

    /// The byte stream.  For archives this decompresses the entry on the
    /// fly; nothing is buffered beyond the reader's own window.
    pub fn stream(&mut self) -> Result<Box<dyn Read + '_>, SourceError> {
        match &mut self.origin {
            Origin::Direct(reader) => Ok(Box::new(reader)),
            Origin::Archive { archive, entry } => {
                let file = archive.by_name(entry.as_str()).map_err(|source| SourceError::Archive {
                    path: self.path.clone(),
                    source,
                })?;
                Ok(Box::new(file))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human-readable origin, e.g. `update.zip!UPDATE.APP`.
    pub fn describe(&self) -> String {
        match &self.origin {
            Origin::Direct(_) => self.path.display().to_string(),
            Origin::Archive { entry, .. } => format!("{}!{}", self.path.display(), entry),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Direct,
    Archive,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("zip") {
            Some(SourceKind::Archive)
        } else if ext.eq_ignore_ascii_case("app") {
            Some(SourceKind::Direct)
        } else {
            None
        }
    }
}

fn open_file(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_owned()),
        _ => SourceError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a/UPDATE.APP")), Some(SourceKind::Direct));
        assert_eq!(SourceKind::from_path(Path::new("update.ZIP")), Some(SourceKind::Archive));
        assert_eq!(SourceKind::from_path(Path::new("update.bin")), None);
        assert_eq!(SourceKind::from_path(Path::new("UPDATE")), None);
    }

    #[test]
    fn direct_stream_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UPDATE.APP");
        std::fs::write(&path, b"raw bytes").unwrap();

        let mut source = ContainerSource::open(&path).unwrap();
        let mut out = Vec::new();
        source.stream().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"raw bytes");
        assert_eq!(source.describe(), path.display().to_string());
    }

    #[test]
    fn archive_stream_reads_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.zip");
        write_zip(&path, &[("README", &b"ignored"[..]), ("UPDATE.APP", &b"inner bytes"[..])]);

        let mut source = ContainerSource::open(&path).unwrap();
        let mut out = Vec::new();
        source.stream().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"inner bytes");
        assert!(source.describe().ends_with("update.zip!UPDATE.APP"));
    }

    #[test]
    fn missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.zip");
        write_zip(&path, &[("OTHER.APP", &b"x"[..])]);
        let err = ContainerSource::open(&path).err().unwrap();
        assert!(matches!(err, SourceError::MissingEntry { ref entry, .. } if entry == "UPDATE.APP"));
    }

    #[test]
    fn corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        let err = ContainerSource::open(&path).err().unwrap();
        assert!(matches!(err, SourceError::Archive { .. }));
    }

    #[test]
    fn missing_file_and_bad_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContainerSource::open(dir.path().join("nope.APP")).err().unwrap();
        assert!(matches!(err, SourceError::NotFound(_)));
        let err = ContainerSource::open(dir.path().join("nope.img")).err().unwrap();
        assert!(matches!(err, SourceError::UnsupportedExtension(_)));
    }
}
