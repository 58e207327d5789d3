use crate::error::{CliError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::callsite::Identifier;
use tracing::subscriber::Interest;
use tracing::Metadata;
use tracing_subscriber::{
    filter::{FilterExt, LevelFilter, Targets},
    fmt,
    layer::{Context, Filter},
    prelude::*,
};
use transat::engine::ADVISORY_TARGET;

/// Targets that follow `-v`; everything else is held at warnings.
const TRANSAT_TARGETS: [&str; 2] = ["transat", "transat_cli"];

pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Per-target filter: the library and CLI log at the requested level, dependencies
/// never below warnings.
pub fn target_filter(verbosity: u8, quiet: bool) -> Targets {
    let level = level_filter(verbosity, quiet);
    Targets::new()
        .with_default(level.min(LevelFilter::WARN))
        .with_targets(TRANSAT_TARGETS.map(|target| (target, level)))
}

/// Lets each advisory call site through once per layer. Every likelihood evaluator
/// reports its own underflow, so a null distribution of many trials would otherwise
/// repeat the same warning for each of them.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryOnce {
    seen: Arc<Mutex<HashSet<Identifier>>>,
}

impl<S> Filter<S> for AdvisoryOnce {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        if !meta.is_event() || meta.target() != ADVISORY_TARGET {
            return true;
        }
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(meta.callsite()),
            Err(_) => true,
        }
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> Interest {
        if meta.target() == ADVISORY_TARGET {
            Interest::sometimes()
        } else {
            Interest::always()
        }
    }
}

/// Installs the global subscriber: compact stderr output, plus a plain-text file
/// with thread ids when `log_file` is given. `quiet` silences stderr only.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(target_filter(verbosity, quiet).and(AdvisoryOnce::default()));

    let file_layer = log_file
        .map(|path| {
            File::create(path).map(|file| {
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_target(true)
                    .with_filter(target_filter(verbosity, false).and(AdvisoryOnce::default()))
            })
        })
        .transpose()
        .map_err(CliError::Io)?;

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install the global logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io;
    use std::sync::Once;
    use tracing::{debug, error, info, trace, warn};
    use tracing_subscriber::fmt::MakeWriter;

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture<F: FnOnce()>(verbosity: u8, quiet: bool, body: F) -> String {
        let out = Captured::default();
        let layer = fmt::layer()
            .with_writer(out.clone())
            .with_ansi(false)
            .with_filter(target_filter(verbosity, quiet).and(AdvisoryOnce::default()));
        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), body);
        out.text()
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        error!("This is an error");
        warn!("This is a warning");
        info!("This is info");
        debug!("This is debug");
        trace!("This is trace");
    }

    #[test]
    #[serial]
    fn verbosity_applies_to_transat_targets_only() {
        let text = capture(2, false, || {
            debug!(target: "transat::engine::tasks", "Sampling null distribution.");
            info!(target: "transat_cli::commands", "Wrote 3 helix row(s).");
            info!(target: "rayon_core::registry", "Spawning workers.");
            warn!(target: "hyper::proto", "Connection reset.");
        });
        assert!(text.contains("Sampling null distribution."));
        assert!(text.contains("Wrote 3 helix row(s)."));
        assert!(!text.contains("Spawning workers."));
        assert!(text.contains("Connection reset."));
    }

    #[test]
    #[serial]
    fn quiet_silences_every_target() {
        let text = capture(3, true, || {
            error!(target: "transat::workflows", "Helix detection failed.");
            warn!(target: ADVISORY_TARGET, "Likelihood underflow.");
        });
        assert!(text.is_empty());
    }

    #[test]
    #[serial]
    fn advisories_are_reported_once_per_call_site() {
        let text = capture(0, false, || {
            for trial in 0..5 {
                warn!(target: ADVISORY_TARGET, trial, "Likelihood underflow.");
            }
            warn!(target: ADVISORY_TARGET, "Realignment with non-gap pairing.");
            for _ in 0..2 {
                warn!(target: "transat::engine", "Ordinary warning.");
            }
        });
        assert_eq!(text.matches("Likelihood underflow.").count(), 1);
        assert_eq!(text.matches("Realignment with non-gap pairing.").count(), 1);
        assert_eq!(text.matches("Ordinary warning.").count(), 2);
    }

    #[test]
    #[serial]
    fn file_layer_records_thread_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("transat.log");

        let file = File::create(&log_path).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_filter(target_filter(2, false));
        let subscriber = tracing_subscriber::registry().with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!(target: "transat::engine", trials = 3, "Sampling null distribution.");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Sampling null distribution."));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = Path::new("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
