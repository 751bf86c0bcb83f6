use super::{LogSink, Severity};

pub struct ConsoleSink {
    write: fn(&str),
    min: Severity,
}

impl ConsoleSink {
    pub const NAME: &'static str = "console";

    pub const fn new(write: fn(&str), min: Severity) -> Self {
        Self { write, min }
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn min_severity(&self) -> Severity {
        self.min
    }

    fn set_min_severity(&mut self, severity: Severity) {
        self.min = severity;
    }

    fn write(&mut self, _severity: Severity, line: &str) {
        (self.write)(line);
    }
}
