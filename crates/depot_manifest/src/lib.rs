pub mod binary;
pub mod files;
pub mod readable;

pub use binary::{decode, decode_async, encode, DecodedManifest};
pub use files::{load_cached_manifest, read_package_version, write_manifest_files, ManifestFiles};

/// First four bytes of every binary manifest ("DEPT" on disk).
pub const MANIFEST_SIGNATURE: u32 = 0x5450_4544;

/// Format version written by this encoder.
pub const FORMAT_VERSION: &str = "1.0.0";

/// Versions this decoder accepts. Older formats are re-fetched, not migrated.
pub const SUPPORTED_VERSIONS: &[&str] = &[FORMAT_VERSION];
