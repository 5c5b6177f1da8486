pub mod fixtures;
pub mod workspace;

pub use workspace::TestWorkspace;

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber honouring `RUST_LOG`. Safe to call from every
/// test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
