use std::io::IsTerminal;
use tracing::Subscriber;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Builds a stderr subscriber. `RUST_LOG` wins over `env_filter` when set.
pub fn get_subscriber(env_filter: &str) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    let stderr = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);
    Registry::default().with(env_filter).with(stderr)
}

/// Register a subscriber as global default.
///
/// It should only be called once!
pub fn init_subscriber(
    subscriber: impl Subscriber + Sync + Send,
) -> Result<(), SetGlobalDefaultError> {
    set_global_default(subscriber)
}
