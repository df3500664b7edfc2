use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use env_logger::Builder;
use log::LevelFilter;

use crate::error::ReportResult;

/// Log target carrying per-report output lines. Hosts can filter these
/// independently of the crate's diagnostic logging, which is the role the
/// original tooling gave a custom severity level.
pub const REPORT_TARGET: &str = "report";

/// Emit a report line through the logging subsystem.
#[macro_export]
macro_rules! report_log {
    ($($arg:tt)*) => {
        log::info!(target: $crate::logging::REPORT_TARGET, $($arg)*)
    };
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.file.flush()
    }
}

/// One-time logger installation for a hosting application. Writes to stdout
/// and, when `log_path` is given, tees every line into that file as well.
///
/// This is process-global state with no teardown. Calling it a second time,
/// or calling it when the host already installed a logger, produces a
/// warning and leaves the existing logger in place; it never fails for that
/// reason.
pub fn init_logging(filter: LevelFilter, log_path: Option<&Path>) -> ReportResult<()> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        log::warn!("logging already initialized; keeping the existing logger");
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.filter_level(filter);
    builder.format(|buf, record| {
        if record.target() == REPORT_TARGET {
            writeln!(buf, "{}", record.args())
        } else {
            writeln!(buf, "{} {}: {}", buf.timestamp(), record.level(), record.args())
        }
    });
    if let Some(path) = log_path {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }
    if builder.try_init().is_err() {
        log::warn!("a logger is already installed; keeping it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinitialization_warns_instead_of_failing() {
        init_logging(LevelFilter::Info, None).expect("first init");
        init_logging(LevelFilter::Debug, None).expect("second init is a warning");
    }
}
