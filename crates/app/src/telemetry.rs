use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber. `RUST_LOG` wins over the default level.
///
/// Logs go to stderr so they never interleave with the quiz on stdout.
pub(crate) fn init_tracing(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|err| err.to_string())?;
    } else {
        builder.try_init().map_err(|err| err.to_string())?;
    }
    Ok(())
}

pub(crate) fn json_from_env() -> bool {
    std::env::var("QUIZ_LOG_JSON")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
