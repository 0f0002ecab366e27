//! Log output for programs embedding the graph.
//!
//! The library itself only emits `tracing` events. A binary (or a test
//! harness) installs a subscriber once with [`init`]. `GRAPH_LOG` takes
//! `EnvFilter` directives such as `property_graph::storage=debug` and
//! defaults to `warn`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GRAPH_LOG";

/// Sends events to stderr. Returns false if a global subscriber was already set.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        init();
        assert!(!init());
    }
}
