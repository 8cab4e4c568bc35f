use std::{fmt, io};

use nu_ansi_term::{Color, Style};
use tracing::{Event, Level, Subscriber, field, span};
use tracing_subscriber::field::{RecordFields, VisitFmt, VisitOutput};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

/// Compact single-line log format: `[LEVEL] [mm-dd|HH:MM:SS.mmm] message key=value ...`.
pub struct RiffleFormat {
    time_format: Option<time::format_description::OwnedFormatItem>,
}

impl<S, N> FormatEvent<S, N> for RiffleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            LevelLabel::new(meta.level(), writer.has_ansi_escapes())
        )?;

        if self.write_time(&mut writer).is_err() {
            write!(writer, "[<unknown-timestamp>]")?;
        }
        writer.write_char(' ')?;

        ctx.format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

impl<'w> FormatFields<'w> for RiffleFormat {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'w>, fields: R) -> fmt::Result {
        let mut visitor = FieldVisitor::new(writer, true);
        fields.record(&mut visitor);
        visitor.finish()
    }

    fn add_fields(
        &self,
        current: &'w mut FormattedFields<Self>,
        fields: &span::Record<'_>,
    ) -> fmt::Result {
        let empty = current.is_empty();
        let mut visitor = FieldVisitor::new(current.as_writer(), empty);
        fields.record(&mut visitor);
        visitor.finish()
    }
}

impl RiffleFormat {
    fn write_time(&self, writer: &mut Writer<'_>) -> fmt::Result {
        let Some(format) = &self.time_format else {
            return Err(fmt::Error);
        };

        let now = time::OffsetDateTime::from(std::time::SystemTime::now());
        let mut adaptor = WriteAdaptor { inner: writer };
        now.format_into(&mut adaptor, format)
            .map(|_| ())
            .map_err(|_| fmt::Error)
    }
}

impl Default for RiffleFormat {
    fn default() -> Self {
        let time_format = time::format_description::parse_owned::<2>(
            r#"\[[month]-[day]|[hour]:[minute]:[second].[subsecond digits:3]\]"#,
        )
        .ok();

        Self { time_format }
    }
}

struct FieldVisitor<'a> {
    writer: Writer<'a>,
    is_empty: bool,
    style: Style,
    result: fmt::Result,
}

impl<'a> FieldVisitor<'a> {
    fn new(writer: Writer<'a>, is_empty: bool) -> Self {
        Self {
            writer,
            is_empty,
            style: Style::new(),
            result: Ok(()),
        }
    }

    fn separator(&mut self) -> &'static str {
        if self.is_empty {
            self.is_empty = false;
            ""
        } else {
            " "
        }
    }
}

impl field::Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.record_debug(field, &format_args!("{value}"))
        } else {
            self.record_debug(field, &value)
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if self.result.is_err() {
            return;
        }

        let sep = self.separator();
        let prefix = self.style.prefix();

        self.result = match field.name() {
            "message" => write!(self.writer, "{sep}{prefix}{value:<40?}"),
            name if self.writer.has_ansi_escapes() => {
                let color = if name == "error" || name == "err" {
                    Color::Red
                } else {
                    Color::Blue
                };
                let value = format!("{value:?}");
                write!(self.writer, "{sep}{prefix}{name}={}", color.paint(value))
            }
            name => write!(self.writer, "{sep}{prefix}{name}={value:?}"),
        };
    }
}

impl VisitOutput<fmt::Result> for FieldVisitor<'_> {
    fn finish(mut self) -> fmt::Result {
        write!(&mut self.writer, "{}", self.style.suffix())?;
        self.result
    }
}

impl VisitFmt for FieldVisitor<'_> {
    fn writer(&mut self) -> &mut dyn fmt::Write {
        &mut self.writer
    }
}

struct LevelLabel<'a> {
    level: &'a Level,
    ansi: bool,
}

impl<'a> LevelLabel<'a> {
    fn new(level: &'a Level, ansi: bool) -> Self {
        Self { level, ansi }
    }
}

impl fmt::Display for LevelLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, color) = match *self.level {
            Level::TRACE => ("TRACE", Color::Purple),
            Level::DEBUG => ("DEBUG", Color::Blue),
            Level::INFO => ("INFO", Color::Green),
            Level::WARN => ("WARN", Color::Yellow),
            Level::ERROR => ("ERROR", Color::Red),
        };

        if self.ansi {
            write!(f, "[{}]", color.paint(label))
        } else {
            write!(f, "[{label}]")
        }
    }
}

struct WriteAdaptor<'a, 'w> {
    inner: &'a mut Writer<'w>,
}

impl io::Write for WriteAdaptor<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fmt::Write::write_str(self.inner, s).map_err(io::Error::other)?;
        Ok(s.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
