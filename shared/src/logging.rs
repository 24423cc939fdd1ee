use std::sync::atomic::{AtomicUsize, Ordering};

use log::{trace, LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::config::PARALLEL;

/// Nesting level of the currently open trace sessions
static TRACE_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// A nested trace session, closed when dropped
///
/// Sessions are only recorded when trace logging is on and the analysis is not running in
/// parallel, otherwise the shared nesting counter would be meaningless.
pub struct Tracer {
    session: Option<(String, usize)>,
}

impl Tracer {
    /// Open a session; the title is only rendered when the session is recorded
    pub fn new<F: FnOnce() -> String>(title: F) -> Self {
        if *PARALLEL || !log::log_enabled!(log::Level::Trace) {
            return Self { session: None };
        }
        let title = title();
        let level = TRACE_DEPTH.fetch_add(1, Ordering::SeqCst);
        trace!("{}-> {}", "  ".repeat(level), title);
        Self {
            session: Some((title, level)),
        }
    }

    /// Record an event within the session
    pub fn log<F: FnOnce() -> String>(&self, event: F) {
        if let Some((_, level)) = &self.session {
            trace!("{}   {}", "  ".repeat(*level), event());
        }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if let Some((title, level)) = self.session.take() {
            trace!("{}<- {}", "  ".repeat(level), title);
            // sessions close in reverse order of opening
            TRACE_DEPTH
                .compare_exchange(level + 1, level, Ordering::SeqCst, Ordering::SeqCst)
                .expect("global TRACE_DEPTH is out of sync");
        }
    }
}

/// Setup the logging globally, keeping the verbose levels to the scalar engine
pub fn setup(verbose: Option<usize>) -> Result<(), SetLoggerError> {
    let verbosity = match verbose.unwrap_or(0) {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("libra_scalar")
        .add_filter_allow_str("libra_shared")
        .set_time_level(LevelFilter::Off)
        .build();
    TermLogger::init(verbosity, config, TerminalMode::Mixed, ColorChoice::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_sessions_unwind() {
        let _ = setup(Some(2));
        {
            let outer = Tracer::new(|| "outer".to_string());
            {
                let inner = Tracer::new(|| "inner".to_string());
                inner.log(|| "event".to_string());
                if !*PARALLEL && log::log_enabled!(log::Level::Trace) {
                    assert_eq!(TRACE_DEPTH.load(Ordering::SeqCst), 2);
                }
            }
            outer.log(|| "event".to_string());
        }
        assert_eq!(TRACE_DEPTH.load(Ordering::SeqCst), 0);
    }
}
