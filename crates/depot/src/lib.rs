pub mod build;
pub mod compiler;
pub mod options;

pub use build::{build_package, BuildOutput};
pub use compiler::{BundleCompiler, CompiledBundle, SimulatedBundleCompiler};
pub use options::PackageBuildOptions;

/// Installs the default tracing subscriber.
///
/// Opt-in: library consumers usually bring their own subscriber, build
/// binaries call this once at startup. Calling it twice is harmless.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt().with_target(false).try_init();
}
