use std::fmt::Write;

use jiff::{Zoned, tz::TimeZone};
use log::Record;
use logforth::{
    append::Stdout,
    diagnostic::Diagnostic,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

/// One line per record: UTC timestamp, padded level, message.
#[derive(Debug, Clone, Default)]
struct LineLayout {
    no_color: bool,
}

impl LineLayout {
    fn no_color(mut self) -> Self {
        self.no_color = true;
        self
    }

    fn level(&self, level: log::Level) -> String {
        if self.no_color {
            return format!("{level:>5}");
        }

        let color = match level {
            log::Level::Error => 31,
            log::Level::Warn => 33,
            log::Level::Info => 32,
            log::Level::Debug => 34,
            log::Level::Trace => 35,
        };

        format!("\x1b[{color}m{level:>5}\x1b[0m")
    }
}

impl Layout for LineLayout {
    fn format(&self, record: &Record<'_>, _diagnostics: &[Box<dyn Diagnostic>]) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();
        let now = Zoned::now().with_time_zone(TimeZone::UTC);

        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;
        write!(output, "{}  ", self.level(record.level()))?;
        write!(output, "{}", record.args())?;

        Ok(output.into_bytes())
    }
}

pub(super) fn init(args: &Args) {
    logforth::builder()
        .dispatch(|d| {
            let d = d.filter(args.env_filter());

            match args.log_style() {
                LogStyle::Color => d.append(Stdout::default().with_layout(LineLayout::default())),
                LogStyle::Text => d.append(Stdout::default().with_layout(LineLayout::default().no_color())),
                LogStyle::Json => d.append(Stdout::default().with_layout(JsonLayout::default())),
            }
        })
        .apply();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_have_no_escape_codes() {
        let layout = LineLayout::default().no_color();
        let args = format_args!("listening");
        let record = Record::builder().level(log::Level::Warn).args(args).build();

        let line = String::from_utf8(layout.format(&record, &[]).unwrap()).unwrap();

        assert!(line.ends_with(" WARN  listening"), "{line}");
        assert!(line.contains('Z'));
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn colored_levels_are_wrapped() {
        assert_eq!(LineLayout::default().level(log::Level::Error), "\x1b[31mERROR\x1b[0m");
    }
}
