pub mod download;
pub mod embedded;
pub mod resolver;

pub use download::{DownloadDescriptor, TransferPolicy, UnpackDescriptor};
pub use embedded::EmbeddedStore;
pub use resolver::{LoadSource, LocationResolution, RemoteHosts, ResolvedBundle, ResolverContext};
