//! Archive write handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use super::object::OObject;
use super::options::WriteOptions;
use super::session::{SessionState, WriteSession, TOP};
use crate::core::{MetaData, TimeSampling};
use crate::ogawa::format::archive_info;
use crate::ogawa::stream::OStream;
use crate::ogawa::write_util::library_version_string;
use crate::util::Result;

pub(crate) type SharedSession = Arc<Mutex<WriteSession>>;

/// An archive being written.
///
/// Objects and properties are created through handles obtained from
/// [`top`](Self::top). Sample payloads go to disk as they are set; the
/// hierarchy is written when the archive is closed or dropped. After that
/// every handle rejects writes with `InvalidState`.
pub struct OArchive {
    session: SharedSession,
    path: PathBuf,
}

impl OArchive {
    /// Create with default options (Digest encoding, no compression).
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, WriteOptions::default())
    }

    /// Create an archive at `path` with explicit options.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn create_with(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = OStream::create(&path)?;

        let when = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let mut meta = MetaData::new()
            .with(archive_info::LIBRARY_VERSION, library_version_string())
            .with(archive_info::WHEN_WRITTEN, when);
        if !options.app_name.is_empty() {
            meta.set(archive_info::APP_NAME, options.app_name.as_str());
        }
        if !options.user_description.is_empty() {
            meta.set(archive_info::USER_DESCRIPTION, options.user_description.as_str());
        }

        debug!(encoding = ?options.encoding, compression = ?options.compression, "creating archive");
        let session = WriteSession::new(stream, options, meta);
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            path,
        })
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The implicit root object `/`.
    pub fn top(&self) -> OObject {
        OObject::new(Arc::clone(&self.session), TOP)
    }

    /// Register a time sampling and return its table index. Index 0 is
    /// the static identity sampling; equal samplings share one index.
    pub fn add_time_sampling(&self, ts: TimeSampling) -> Result<u32> {
        self.session.lock().add_time_sampling(ts)
    }

    /// Size of the time sampling table, identity included.
    pub fn num_time_samplings(&self) -> usize {
        self.session.lock().num_time_samplings()
    }

    /// Add an archive-level metadata entry.
    pub fn set_archive_meta(&self, key: &str, value: &str) -> Result<()> {
        let mut session = self.session.lock();
        session.ensure_writing()?;
        session.archive_meta.set(key, value);
        Ok(())
    }

    /// Whether the archive has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.session.lock().state == SessionState::Sealed
    }

    /// Write the hierarchy and seal the file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn close(self) -> Result<()> {
        let sealed = self.session.lock().seal();
        sealed
    }
}

impl Drop for OArchive {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        if session.state == SessionState::Writing {
            if let Err(e) = session.seal() {
                warn!(path = %self.path.display(), error = %e, "failed to seal archive on drop");
            }
        }
    }
}
