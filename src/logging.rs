//! Tracing subscriber setup for the command-line tool

use std::io::{self, IsTerminal};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Filter directive for a verbosity level. `RUST_LOG` takes precedence.
pub fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "motion_pretrain=info,warn",
        1 => "motion_pretrain=debug,info",
        2 => "motion_pretrain=trace,debug",
        _ => "trace",
    }
}

/// Install the global subscriber
pub fn init_logging(verbosity: u8, quiet: bool, json_output: bool) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !quiet => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(default_directive(verbosity, quiet)),
    }
    .map_err(|e| Error::validation(format!("invalid log filter: {e}")))?;

    let installed = if json_output {
        // JSON output for machine parsing
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(json_layer).try_init()
    } else if io::stdout().is_terminal() {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).try_init()
    } else {
        // Plain output for pipes and log files
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).try_init()
    };

    installed.map_err(|e| Error::Other(anyhow::anyhow!("failed to install logger: {e}")))
}
