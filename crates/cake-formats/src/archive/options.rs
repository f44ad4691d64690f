//! Reader and builder settings

use std::sync::Arc;

use crate::chunk::{BlockCodec, Codec, DEFAULT_SECTORS_PER_CHUNK, MIN_COMPRESS_SIZE};
use crate::toc::RegistryType;
use crate::version::CakeVersion;

/// Settings for opening a cake
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Ignore the encryption flags in the header
    ///
    /// Some cakes have the flags set without actually being enciphered. With
    /// the override on, nothing is decrypted, string scrambling is ignored and
    /// section checksums are not checked.
    pub force_no_encryption: bool,
    /// Codec used for compressed chunks
    pub codec: Arc<dyn BlockCodec>,
    /// Check stored payload checksums (6.x and 8.x entries)
    pub verify_payload_checksums: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            force_no_encryption: false,
            codec: Arc::new(Codec::default()),
            verify_payload_checksums: true,
        }
    }
}

impl OpenOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the force-no-encryption override
    #[must_use]
    pub fn with_force_no_encryption(mut self, force: bool) -> Self {
        self.force_no_encryption = force;
        self
    }

    /// Use a different block codec
    #[must_use]
    pub fn with_codec(mut self, codec: impl BlockCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Toggle payload checksum verification
    #[must_use]
    pub fn with_payload_checksums(mut self, verify: bool) -> Self {
        self.verify_payload_checksums = verify;
        self
    }
}

/// Settings for baking a cake
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Format revision to write
    pub version: CakeVersion,
    /// Registry type stored in the flags
    pub registry_type: RegistryType,
    /// Encipher the header table and sections
    pub header_encryption: bool,
    /// Encipher file payloads; no version supports this yet
    pub file_encryption: bool,
    /// Sectors per compression chunk (9.x)
    pub sectors_per_chunk: u16,
    /// Smallest file size that is compressed
    pub compression_min_size: u64,
    /// Codec used for compressed chunks
    pub codec: Arc<dyn BlockCodec>,
    /// Name recorded as the packed source directory (9.x)
    pub origin: Option<String>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            version: CakeVersion::V9_2,
            registry_type: RegistryType::Regular,
            header_encryption: false,
            file_encryption: false,
            sectors_per_chunk: DEFAULT_SECTORS_PER_CHUNK,
            compression_min_size: MIN_COMPRESS_SIZE,
            codec: Arc::new(Codec::default()),
            origin: None,
        }
    }
}

impl BuilderOptions {
    /// Default options for a version
    pub fn new(version: CakeVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Set the registry type
    #[must_use]
    pub fn with_registry_type(mut self, registry_type: RegistryType) -> Self {
        self.registry_type = registry_type;
        self
    }

    /// Enable or disable header and section encryption
    #[must_use]
    pub fn with_header_encryption(mut self, enabled: bool) -> Self {
        self.header_encryption = enabled;
        self
    }

    /// Request payload encryption; baking then fails with `PayloadCipherUnavailable`
    #[must_use]
    pub fn with_file_encryption(mut self, enabled: bool) -> Self {
        self.file_encryption = enabled;
        self
    }

    /// Set sectors per chunk
    #[must_use]
    pub fn with_sectors_per_chunk(mut self, sectors: u16) -> Self {
        self.sectors_per_chunk = sectors;
        self
    }

    /// Set the compression size threshold
    #[must_use]
    pub fn with_compression_min_size(mut self, size: u64) -> Self {
        self.compression_min_size = size;
        self
    }

    /// Use a different block codec
    #[must_use]
    pub fn with_codec(mut self, codec: impl BlockCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Record an origin directory name
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}
