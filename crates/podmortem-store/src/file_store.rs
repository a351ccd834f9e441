//! Directory-backed report storage.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parking_lot::RwLock;

use podmortem_core::ForensicReport;

use crate::error::{Result, StoreError};
use crate::storage::{PruneResult, SaveResult, Storage};

/// On-disk compression of report documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Plain JSON.
    #[default]
    None,
    /// Gzipped JSON (`.json.gz`).
    Gzip,
}

impl Compression {
    /// Parses a configuration value; anything other than `gzip`/`gz`
    /// (case- and whitespace-insensitive) means no compression.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "gzip" | "gz" => Self::Gzip,
            _ => Self::None,
        }
    }

    const fn extension(self) -> &'static str {
        match self {
            Self::None => ".json",
            Self::Gzip => ".json.gz",
        }
    }
}

/// Durable report store: one file per report under a base directory.
///
/// Writes are crash-safe: the document is streamed to a temp file in the
/// same directory, fsynced, then renamed into place, so a partially
/// written report can never appear under a final name. Save and prune take
/// the write half of the lock; load and list share the read half. The
/// atomic rename keeps the layout safe across processes even without the
/// lock.
pub struct FileStore {
    base_dir: PathBuf,
    compression: Compression,
    lock: RwLock<()>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `base_dir`. An empty
    /// path falls back to `reports`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>, compression: Compression) -> Result<Self> {
        let mut base_dir: PathBuf = base_dir.into();
        if base_dir.as_os_str().is_empty() {
            base_dir = PathBuf::from("reports");
        }

        fs::create_dir_all(&base_dir).map_err(StoreError::CreateDir)?;

        Ok(Self {
            base_dir,
            compression,
            lock: RwLock::new(()),
        })
    }

    /// The store's base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The configured compression.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    fn save_locked(&self, report: &ForensicReport) -> Result<SaveResult> {
        let filename = format!(
            "{}_{}_{}{}",
            report.id,
            report.crash.namespace,
            report.crash.pod_name,
            self.compression.extension()
        );
        let path = self.base_dir.join(filename);

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("{}_", report.id))
            .suffix(".tmp")
            .tempfile_in(&self.base_dir)?;

        let bytes_written = {
            let counter = CountingWriter::new(tmp.as_file_mut());
            match self.compression {
                Compression::Gzip => {
                    let mut encoder = GzEncoder::new(counter, flate2::Compression::default());
                    serde_json::to_writer(&mut encoder, report)?;
                    encoder.write_all(b"\n")?;
                    encoder.finish()?.written()
                }
                Compression::None => {
                    let mut counter = counter;
                    serde_json::to_writer(&mut counter, report)?;
                    counter.write_all(b"\n")?;
                    counter.written()
                }
            }
        };

        tmp.as_file().sync_all()?;

        if let Err(persist_err) = tmp.persist(&path) {
            // Rename does not replace an existing destination everywhere;
            // clear it and retry once.
            let tmp = persist_err.file;
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        }

        Ok(SaveResult {
            bytes_written,
            path,
        })
    }

    fn files_by_id(&self, id: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{id}_");
        self.scan(|name| name.starts_with(&prefix))
    }

    pub(crate) fn files_all(&self) -> Result<Vec<PathBuf>> {
        self.scan(|_| true)
    }

    fn scan(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.base_dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|n| n.to_string_lossy())
                    .is_some_and(|name| {
                        (name.ends_with(".json") || name.ends_with(".json.gz")) && keep(&name)
                    })
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Storage for FileStore {
    fn save(&self, report: &ForensicReport) -> Result<()> {
        let _guard = self.lock.write();
        self.save_locked(report).map(|_| ())
    }

    fn save_with_result(&self, report: &ForensicReport) -> Result<Option<SaveResult>> {
        let _guard = self.lock.write();
        self.save_locked(report).map(Some)
    }

    fn load(&self, id: &str) -> Result<ForensicReport> {
        let _guard = self.lock.read();

        let files = self.files_by_id(id)?;
        let Some(path) = files.first() else {
            return Err(StoreError::NotFound(id.to_string()));
        };

        read_report(path)
    }

    fn list(&self) -> Result<Vec<ForensicReport>> {
        let _guard = self.lock.read();

        let files = self.files_all()?;
        let mut reports = Vec::with_capacity(files.len());
        for path in files {
            // A single corrupt file must not deny the whole listing.
            if let Ok(report) = read_report(&path) {
                reports.push(report);
            }
        }

        Ok(reports)
    }

    fn prune(&self, retention: Duration) -> Result<Option<PruneResult>> {
        let _guard = self.lock.write();
        self.prune_locked(retention).map(Some)
    }
}

pub(crate) fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn read_report(path: &Path) -> Result<ForensicReport> {
    Ok(serde_json::from_reader(open_reader(path)?)?)
}

struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    const fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    const fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
