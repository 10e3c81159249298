//! Tracing helpers
// (c) 2024 Ross Younger

use std::{
    fs::File,
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use indicatif::MultiProgress;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const STANDARD_ENV_VAR: &str = "RUST_LOG";
const LOG_FILE_DETAIL_ENV_VAR: &str = "RUST_LOG_FILE_DETAIL";

/// Our own log target; without `RUST_LOG` only these events are shown
const OWN_TARGET: &str = "xfer";

/// An `EnvFilter`, and whether it came from the environment
struct Filter {
    filter: EnvFilter,
    from_env: bool,
}

/// Reads a filter from the environment variable `key`.
/// If it is unset, logs only our own events at `level`. If it is set but invalid, that's an error.
fn filter_for(level: &str, key: &str) -> anyhow::Result<Filter> {
    match EnvFilter::try_from_env(key) {
        Ok(filter) => Ok(Filter {
            filter,
            from_env: true,
        }),
        Err(e) if std::env::var_os(key).is_some() => {
            anyhow::bail!("{key} (set in environment) was invalid: {e}")
        }
        Err(_) => Ok(Filter {
            filter: EnvFilter::new(format!("{OWN_TARGET}={level}")),
            from_env: false,
        }),
    }
}

/// Sets up rust tracing to the console, drawing around `display`, and optionally to a file.
///
/// `level` applies to xfer's own events; `RUST_LOG` overrides it.
/// The log file uses `RUST_LOG_FILE_DETAIL` if set, falling back to the console filter.
///
/// **CAUTION:** If this function fails, tracing won't be set up; callers must take extra care to report the error.
pub fn setup(level: &str, display: &MultiProgress, log_file: Option<&Path>) -> anyhow::Result<()> {
    let console = filter_for(level, STANDARD_ENV_VAR)?;
    // Show targets only when somebody asked for other crates' events
    let mut layers = vec![fmt::layer()
        .compact()
        .with_target(console.from_env)
        .with_writer(ProgressWriter::wrap(display))
        .with_filter(console.filter)
        .boxed()];

    if let Some(path) = log_file {
        let out_file = Arc::new(
            File::create(path).with_context(|| format!("Failed to open log file {path:?}"))?,
        );
        let detail = if std::env::var_os(LOG_FILE_DETAIL_ENV_VAR).is_some() {
            filter_for(level, LOG_FILE_DETAIL_ENV_VAR)?
        } else {
            filter_for(level, STANDARD_ENV_VAR)?
        };
        layers.push(
            fmt::layer()
                .compact()
                .with_ansi(false)
                .with_target(detail.from_env)
                .with_writer(out_file)
                .with_filter(detail.filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

/// Lets tracing output coexist with a `MultiProgress` without mangling its bars
struct ProgressWriter {
    display: MultiProgress,
}

impl ProgressWriter {
    fn wrap(display: &MultiProgress) -> Mutex<Self> {
        Mutex::new(Self {
            display: display.clone(),
        })
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = std::str::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let msg = msg.trim_end_matches('\n');
        if self.display.is_hidden() {
            eprintln!("{msg}");
        } else {
            self.display.println(msg)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::filter_for;

    #[test]
    fn unset_variable_falls_back() {
        let f = filter_for("debug", "XFER_TEST_SURELY_UNSET_VARIABLE").unwrap();
        assert!(!f.from_env);
        assert_eq!(f.filter.to_string(), "xfer=debug");
    }
}
