use std::env;

use tracing::dispatcher;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

pub(crate) fn init_once() {
    // Skip init if has been set
    if dispatcher::has_been_set() {
        return;
    }

    // set default log level
    const KEY: &str = "RUST_LOG";
    if env::var_os(KEY).is_none() {
        env::set_var(KEY, "INFO");
    }

    Registry::default()
        .with(::tracing_subscriber::EnvFilter::from_default_env())
        .with(::tracing_subscriber::fmt::layer())
        .init();
}
