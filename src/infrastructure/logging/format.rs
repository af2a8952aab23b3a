//! Format templates for handler output
//!
//! Templates use `{field[:spec]}` placeholders and `<tag>...</tag>` markup:
//!
//! ```text
//! <green>{time:YYYY-MM-DD HH:mm:ss}</green> | <level>{level: <8}</level> | {name}:{function}:{line} - {message}
//! ```
//!
//! Markup becomes ANSI styling when the handler colorizes and is dropped
//! otherwise. `{{` and `}}` produce literal braces.

use std::fmt::Write as _;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use console::Style;

use crate::domain::models::{ExceptionInfo, Level, LogRecord, Severity, DEFAULT_FORMAT};

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Placeholder for location parts that are unknown
const UNKNOWN: &str = "-";

/// Parsed format template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
    Open(Markup),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    kind: FieldKind,
    align: Option<Align>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldKind {
    Time(String),
    Level,
    LevelNo,
    Name,
    Module,
    Function,
    File,
    FilePath,
    Line,
    Thread,
    Message,
    Extra,
    Exception,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Align {
    fill: char,
    side: Side,
    width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Markup {
    Level,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Bold,
    Dim,
    Italic,
    Underline,
    Blink,
    Reverse,
    Hide,
    Normal,
}

impl FormatTemplate {
    pub fn parse(template: &str) -> Self {
        Self {
            source: template.to_string(),
            segments: parse_segments(template),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the template places the exception itself
    pub fn has_exception_field(&self) -> bool {
        self.segments.iter().any(|segment| {
            matches!(
                segment,
                Segment::Field(Field {
                    kind: FieldKind::Exception,
                    ..
                })
            )
        })
    }

    /// Render one record, without a trailing newline
    pub fn render(&self, record: &LogRecord, colorize: bool) -> String {
        let mut out = String::new();
        let mut stack: Vec<Markup> = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => push_styled(&mut out, text, &stack, record.severity, colorize),
                Segment::Field(field) => {
                    let value = field.render(record);
                    push_styled(&mut out, &value, &stack, record.severity, colorize);
                }
                Segment::Open(markup) => stack.push(*markup),
                Segment::Close => {
                    stack.pop();
                }
            }
        }

        out
    }
}

impl Default for FormatTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_FORMAT)
    }
}

/// Render an exception block for appending below a record
///
/// `backtrace` adds the source chain, `diagnose` the debug representation.
pub fn render_exception(exception: &ExceptionInfo, backtrace: bool, diagnose: bool) -> String {
    let mut out = format!("Error: {}", exception.message);
    if backtrace {
        for cause in &exception.chain {
            let _ = write!(out, "\nCaused by: {cause}");
        }
    }
    if diagnose {
        if let Some(debug) = &exception.debug {
            let _ = write!(out, "\n{debug}");
        }
    }
    out
}

fn parse_segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = template;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("{{") || rest.starts_with("}}") {
            text.push(ch);
            rest = &rest[2..];
            continue;
        }

        match ch {
            '{' => {
                let Some(end) = rest.find('}') else {
                    text.push_str(rest);
                    break;
                };
                flush_text(&mut text, &mut segments);
                segments.push(Segment::Field(Field::parse(&rest[1..end])));
                rest = &rest[end + 1..];
            }
            '<' => {
                if let Some((segment, len)) = parse_tag(rest) {
                    flush_text(&mut text, &mut segments);
                    segments.push(segment);
                    rest = &rest[len..];
                } else {
                    text.push('<');
                    rest = &rest[1..];
                }
            }
            _ => {
                text.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    flush_text(&mut text, &mut segments);
    segments
}

fn flush_text(text: &mut String, segments: &mut Vec<Segment>) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text)));
    }
}

fn parse_tag(input: &str) -> Option<(Segment, usize)> {
    let end = input.find('>')?;
    let inner = &input[1..end];
    let len = end + 1;

    if inner == "/" {
        return Some((Segment::Close, len));
    }
    if let Some(name) = inner.strip_prefix('/') {
        Markup::parse(name)?;
        return Some((Segment::Close, len));
    }
    Markup::parse(inner).map(|markup| (Segment::Open(markup), len))
}

impl Field {
    fn parse(inner: &str) -> Self {
        let (name, spec) = match inner.split_once(':') {
            Some((name, spec)) => (name.trim(), Some(spec)),
            None => (inner.trim(), None),
        };

        let kind = match name {
            "time" => {
                return Self {
                    kind: FieldKind::Time(time_format(spec)),
                    align: None,
                }
            }
            "level" => FieldKind::Level,
            "level.no" => FieldKind::LevelNo,
            "name" => FieldKind::Name,
            "module" => FieldKind::Module,
            "function" => FieldKind::Function,
            "file" | "file.name" => FieldKind::File,
            "file.path" => FieldKind::FilePath,
            "line" => FieldKind::Line,
            "thread" | "thread.name" => FieldKind::Thread,
            "message" => FieldKind::Message,
            "extra" => FieldKind::Extra,
            "exception" => FieldKind::Exception,
            _ => FieldKind::Unknown(inner.to_string()),
        };

        Self {
            kind,
            align: spec.and_then(Align::parse),
        }
    }

    fn render(&self, record: &LogRecord) -> String {
        let origin = &record.origin;
        let value = match &self.kind {
            FieldKind::Time(format) => {
                let mut out = String::new();
                let _ = write!(out, "{}", record.timestamp.format(format));
                out
            }
            FieldKind::Level => record.severity.to_string(),
            FieldKind::LevelNo => record.severity.no().to_string(),
            FieldKind::Name => record.name().to_string(),
            FieldKind::Module => origin
                .file
                .as_deref()
                .and_then(|file| Path::new(file).file_stem())
                .map_or_else(|| UNKNOWN.to_string(), |stem| stem.to_string_lossy().into_owned()),
            FieldKind::Function => origin.function.as_deref().unwrap_or(UNKNOWN).to_string(),
            FieldKind::File => origin.file_name().unwrap_or(UNKNOWN).to_string(),
            FieldKind::FilePath => origin.file.as_deref().unwrap_or(UNKNOWN).to_string(),
            FieldKind::Line => origin
                .line
                .map_or_else(|| UNKNOWN.to_string(), |line| line.to_string()),
            FieldKind::Thread => record.thread.as_deref().unwrap_or(UNKNOWN).to_string(),
            FieldKind::Message => record.message.clone(),
            FieldKind::Extra => serde_json::to_string(&record.extra).unwrap_or_default(),
            FieldKind::Exception => record
                .exception
                .as_ref()
                .map(|exception| {
                    std::iter::once(exception.message.as_str())
                        .chain(exception.chain.iter().map(String::as_str))
                        .collect::<Vec<_>>()
                        .join(": ")
                })
                .unwrap_or_default(),
            FieldKind::Unknown(raw) => format!("{{{raw}}}"),
        };

        match self.align {
            Some(align) => align.pad(&value),
            None => value,
        }
    }
}

impl Align {
    /// Parse `[[fill]align]width`, e.g. ` <8`, `>5`, `10`
    fn parse(spec: &str) -> Option<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let side_of = |c: char| match c {
            '<' => Some(Side::Left),
            '>' => Some(Side::Right),
            '^' => Some(Side::Center),
            _ => None,
        };

        let (fill, side, digits) = match chars.as_slice() {
            [fill, align, rest @ ..] if side_of(*align).is_some() => {
                (*fill, side_of(*align)?, rest)
            }
            [align, rest @ ..] if side_of(*align).is_some() => (' ', side_of(*align)?, rest),
            rest => (' ', Side::Left, rest),
        };

        let width = digits.iter().collect::<String>().parse().ok()?;
        Some(Self { fill, side, width })
    }

    fn pad(self, value: &str) -> String {
        let len = value.chars().count();
        if len >= self.width {
            return value.to_string();
        }
        let missing = self.width - len;
        let (left, right) = match self.side {
            Side::Left => (0, missing),
            Side::Right => (missing, 0),
            Side::Center => (missing / 2, missing - missing / 2),
        };

        let mut out = String::with_capacity(self.width);
        out.extend(std::iter::repeat(self.fill).take(left));
        out.push_str(value);
        out.extend(std::iter::repeat(self.fill).take(right));
        out
    }
}

impl Markup {
    fn parse(tag: &str) -> Option<Self> {
        let markup = match tag {
            "level" | "lvl" => Self::Level,
            "black" | "k" => Self::Black,
            "red" | "r" => Self::Red,
            "green" | "g" => Self::Green,
            "yellow" | "y" => Self::Yellow,
            "blue" | "e" => Self::Blue,
            "magenta" | "m" => Self::Magenta,
            "cyan" | "c" => Self::Cyan,
            "white" | "w" => Self::White,
            "bold" | "b" => Self::Bold,
            "dim" | "d" => Self::Dim,
            "italic" | "i" => Self::Italic,
            "underline" | "u" => Self::Underline,
            "blink" | "l" => Self::Blink,
            "reverse" | "v" => Self::Reverse,
            "hide" | "h" => Self::Hide,
            "normal" | "n" => Self::Normal,
            _ => return None,
        };
        Some(markup)
    }

    fn apply(self, style: Style, severity: Severity) -> Style {
        match self {
            Self::Level => level_style(style, severity),
            Self::Black => style.black(),
            Self::Red => style.red(),
            Self::Green => style.green(),
            Self::Yellow => style.yellow(),
            Self::Blue => style.blue(),
            Self::Magenta => style.magenta(),
            Self::Cyan => style.cyan(),
            Self::White => style.white(),
            Self::Bold => style.bold(),
            Self::Dim => style.dim(),
            Self::Italic => style.italic(),
            Self::Underline => style.underlined(),
            Self::Blink => style.blink(),
            Self::Reverse => style.reverse(),
            Self::Hide => style.hidden(),
            Self::Normal => Style::new().force_styling(true),
        }
    }
}

fn level_style(style: Style, severity: Severity) -> Style {
    match severity {
        Severity::Named(Level::Trace) => style.cyan().bold(),
        Severity::Named(Level::Debug) => style.blue().bold(),
        Severity::Named(Level::Info) => style.bold(),
        Severity::Named(Level::Success) => style.green().bold(),
        Severity::Named(Level::Warning) => style.yellow().bold(),
        Severity::Named(Level::Error) => style.red().bold(),
        Severity::Named(Level::Critical) => style.red().bold().reverse(),
        Severity::Numeric(_) => style,
    }
}

fn push_styled(out: &mut String, text: &str, stack: &[Markup], severity: Severity, colorize: bool) {
    if !colorize || stack.is_empty() || text.is_empty() {
        out.push_str(text);
        return;
    }
    let style = stack
        .iter()
        .fold(Style::new().force_styling(true), |style, markup| {
            markup.apply(style, severity)
        });
    let _ = write!(out, "{}", style.apply_to(text));
}

/// Convert a `{time:...}` spec into a chrono format string
///
/// Accepts chrono formats directly (anything containing `%`) or the
/// `YYYY-MM-DD HH:mm:ss.SSS` token style. Invalid formats fall back to the
/// default.
fn time_format(spec: Option<&str>) -> String {
    let Some(spec) = spec.filter(|spec| !spec.trim().is_empty()) else {
        return DEFAULT_TIME_FORMAT.to_string();
    };

    let format = if spec.contains('%') {
        spec.to_string()
    } else {
        [
            ("YYYY", "%Y"),
            ("MM", "%m"),
            ("DD", "%d"),
            ("HH", "%H"),
            ("mm", "%M"),
            ("SSS", "%3f"),
            ("ss", "%S"),
            ("ZZ", "%:z"),
        ]
        .into_iter()
        .fold(spec.to_string(), |format, (token, chrono)| {
            format.replace(token, chrono)
        })
    };

    if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        DEFAULT_TIME_FORMAT.to_string()
    } else {
        format
    }
}
