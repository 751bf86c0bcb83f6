//! Leveled log fan-out.
//!
//! Every `log` record is formatted once into a bounded line and handed to
//! each registered sink whose minimum severity it meets.

mod backlog;
mod console;

use alloc::{boxed::Box, vec::Vec};
use core::{
    cell::RefCell,
    fmt::{self, Write as _},
};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

pub use backlog::{BacklogLogComponent, BacklogQueue, BacklogSink, DrainGuard};
pub use console::ConsoleSink;

pub const LOG_LINE_MAX: usize = 256;
/// `log` target that promotes an error record to [`Severity::Critical`].
pub const CRITICAL: &str = "critical";

pub type LogLine = heapless::String<LOG_LINE_MAX>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::None => "None",
        }
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Trace => "TRC",
            Self::Debug => "DBG",
            Self::Information => "INF",
            Self::Warning => "WRN",
            Self::Error => "ERR",
            Self::Critical => "CRT",
            Self::None => "",
        }
    }

    /// Parses a level name, tag or initial; anything unrecognised yields
    /// `default`.
    pub fn parse(text: &str, default: Severity) -> Severity {
        const NAMES: [(Severity, [&str; 3]); 7] = [
            (Severity::None, ["n", "off", "none"]),
            (Severity::Trace, ["t", "trc", "trace"]),
            (Severity::Debug, ["d", "dbg", "debug"]),
            (Severity::Information, ["i", "inf", "information"]),
            (Severity::Warning, ["w", "wrn", "warning"]),
            (Severity::Error, ["e", "err", "error"]),
            (Severity::Critical, ["c", "crt", "critical"]),
        ];

        let text = text.trim();
        NAMES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| alias.eq_ignore_ascii_case(text)))
            .map_or(default, |(severity, _)| *severity)
    }

    pub fn from_record(level: log::Level, target: &str) -> Severity {
        match level {
            log::Level::Error if target == CRITICAL => Self::Critical,
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warning,
            log::Level::Info => Self::Information,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

pub trait LogSink: Send {
    fn name(&self) -> &'static str;
    fn min_severity(&self) -> Severity;
    fn set_min_severity(&mut self, severity: Severity);
    fn write(&mut self, severity: Severity, line: &str);
}

/// Formats `"<TAG>: <message>"`, cutting the message at [`LOG_LINE_MAX`] bytes.
pub fn format_line(severity: Severity, args: fmt::Arguments<'_>) -> LogLine {
    let mut line = LogLine::new();
    let _ = write!(Truncating(&mut line), "{}: {}", severity.tag(), args);
    line
}

pub fn truncated_line(text: &str) -> LogLine {
    let mut line = LogLine::new();
    let _ = Truncating(&mut line).write_str(text);
    line
}

struct Truncating<'a>(&'a mut LogLine);

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            self.0.push(ch).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

pub struct Dispatcher {
    sinks: Mutex<CriticalSectionRawMutex, RefCell<Vec<Box<dyn LogSink>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self {
            sinks: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn add_sink(&self, sink: Box<dyn LogSink>) {
        self.sinks.lock(|sinks| {
            if let Ok(mut sinks) = sinks.try_borrow_mut() {
                sinks.push(sink);
            }
        });
    }

    /// Changes the minimum severity of the sink called `name`.
    pub fn set_level(&self, name: &str, severity: Severity) -> bool {
        self.sinks.lock(|sinks| {
            let Ok(mut sinks) = sinks.try_borrow_mut() else {
                return false;
            };
            let mut found = false;
            for sink in sinks.iter_mut().filter(|sink| sink.name() == name) {
                sink.set_min_severity(severity);
                found = true;
            }
            found
        })
    }

    pub fn sink_count(&self) -> usize {
        self.sinks
            .lock(|sinks| sinks.try_borrow().map_or(0, |sinks| sinks.len()))
    }

    /// The sink list is taken out of the critical section for the writes, so
    /// slow sinks (the UART console) run with interrupts enabled. Records
    /// emitted while the list is out, including from inside a sink, are
    /// dropped.
    pub fn dispatch(&self, severity: Severity, args: fmt::Arguments<'_>) {
        if severity == Severity::None {
            return;
        }
        let taken = self.sinks.lock(|sinks| {
            let mut sinks = sinks.try_borrow_mut().ok()?;
            if !sinks.iter().any(|sink| severity >= sink.min_severity()) {
                return None;
            }
            Some(core::mem::take(&mut *sinks))
        });
        let Some(mut taken) = taken else {
            return;
        };

        let line = format_line(severity, args);
        for sink in taken.iter_mut() {
            if severity >= sink.min_severity() {
                sink.write(severity, &line);
            }
        }

        self.sinks.lock(|sinks| {
            if let Ok(mut sinks) = sinks.try_borrow_mut() {
                // Sinks added during the writes go after the existing ones.
                taken.append(&mut sinks);
                *sinks = taken;
            }
        });
    }
}

impl log::Log for Dispatcher {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        self.dispatch(
            Severity::from_record(record.level(), record.target()),
            *record.args(),
        );
    }

    fn flush(&self) {}
}

pub static DISPATCHER: Dispatcher = Dispatcher::new();

/// Installs [`DISPATCHER`] as the `log` backend with `console` as its first
/// sink.
pub fn install(console: ConsoleSink) -> Result<(), log::SetLoggerError> {
    DISPATCHER.add_sink(Box::new(console));
    log::set_logger(&DISPATCHER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

pub fn add_sink(sink: Box<dyn LogSink>) {
    DISPATCHER.add_sink(sink);
}

pub fn set_console_level(severity: Severity) -> bool {
    DISPATCHER.set_level(ConsoleSink::NAME, severity)
}
