//! Write-side configuration.

/// On-disk encoding variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Records sample content keys and per-object hashes.
    #[default]
    Digest,
    /// Payloads only; hash queries on read return `None`.
    Compact,
}

/// Options for [`OArchive::create_with`](super::OArchive::create_with).
#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub encoding: Encoding,
    /// Zlib level (0-9) for sample payloads; `None` stores them raw.
    pub compression: Option<u32>,
    /// Store identical payloads once per archive.
    pub deduplicate: bool,
    pub app_name: String,
    pub user_description: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Digest,
            compression: None,
            deduplicate: true,
            app_name: String::new(),
            user_description: String::new(),
        }
    }
}

impl WriteOptions {
    /// Digest encoding, no compression, dedup on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose Digest or Compact encoding.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Zlib level for sample payloads, 0..=9.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Some(level.min(9));
        self
    }

    /// Share identical sample payloads.
    pub fn with_deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Application name stored in the archive info.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Free-form description stored in the archive info.
    pub fn with_user_description(mut self, description: impl Into<String>) -> Self {
        self.user_description = description.into();
        self
    }

    #[inline]
    pub fn records_digests(&self) -> bool {
        self.encoding == Encoding::Digest
    }
}
