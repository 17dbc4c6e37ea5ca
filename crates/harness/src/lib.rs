mod site;
mod stubs;

pub use site::{SiteStore, TestSite, at};
pub use stubs::{CountingStore, ReversingStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Routes engine events to the test writer. Honours `RUST_LOG`; safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formstitch_engine=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
