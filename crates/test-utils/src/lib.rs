//! Shared fixtures for the integration tests: tracing capture, a timeout
//! guard, config/registry builders and an in-process fake executor.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

pub use builders::{ConfigFileBuilder, RegistryBuilder};
pub use fake_executor::{run_plan, FakeExecutor, FakeRun};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness, which shows it only
/// for failing tests. `RUST_LOG` picks the filter (default `info`).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `fut`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<T>(fut: impl Future<Output = T>) -> T {
    match tokio::time::timeout(TEST_TIMEOUT, fut).await {
        Ok(value) => value,
        Err(_) => panic!("test did not finish within {TEST_TIMEOUT:?}"),
    }
}
