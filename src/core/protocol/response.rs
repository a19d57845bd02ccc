//! Response collection, error classification and answer parsing

use super::command::canonical_name;
use super::line::read_line;
use super::{AtError, ModemError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Final result code of a successful command
pub const OK: &str = "OK";

/// Classification of one response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Empty line, ignored
    Blank,
    /// Terminal success
    Ok,
    /// Terminal failure
    Error(AtError),
    /// Information text belonging to the answer
    Data,
}

/// Classify a trimmed response line
pub fn classify_line(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line == OK {
        return LineKind::Ok;
    }
    if line.starts_with("+CMS ERROR") {
        if line.contains("SIM busy") {
            return LineKind::Error(AtError::SimBusy);
        }
        return LineKind::Error(AtError::Generic(line.to_string()));
    }
    if line.starts_with("+CME ERROR") || line.starts_with("+EXT ERROR") || line.starts_with("ERROR") {
        return LineKind::Error(AtError::Generic(line.to_string()));
    }
    LineKind::Data
}

/// Information lines collected between a command and its final result code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAnswer {
    lines: Vec<String>,
}

impl RawAnswer {
    /// Answer made of `lines`; blank lines are dropped
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(Into::into)
                .filter(|l: &String| !l.is_empty())
                .collect(),
        }
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Lines in arrival order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the modem sent no information text
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Take the lines
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Parsed answer of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// The answer had exactly one line
    Line(String),
    /// The answer had zero or several lines
    Lines(Vec<String>),
}

impl Value {
    /// The single line, if the answer had exactly one
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Self::Line(s) => Some(s),
            Self::Lines(_) => None,
        }
    }

    /// All lines, whatever the shape
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::Line(s) => vec![s.as_str()],
            Self::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    /// Whether there is no information text at all
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Line(s) => s.is_empty(),
            Self::Lines(lines) => lines.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(s) => f.write_str(s),
            Self::Lines(lines) => f.write_str(&lines.join("\n")),
        }
    }
}

/// Read lines until `OK` or an error line
///
/// Returns the information lines on `OK`. The first error line ends the read
/// with the matching [`AtError`].
pub async fn read_answer<R>(reader: &mut R, timeout: Duration) -> Result<RawAnswer, ModemError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut answer = RawAnswer::default();
    loop {
        let line = read_line(reader, timeout).await?;
        if accept_line(&mut answer, line)? {
            return Ok(answer);
        }
    }
}

/// Feed one line into `answer`; `Ok(true)` once the final result code is seen
pub(crate) fn accept_line(answer: &mut RawAnswer, line: String) -> Result<bool, AtError> {
    match classify_line(&line) {
        LineKind::Blank => Ok(false),
        LineKind::Ok => Ok(true),
        LineKind::Error(e) => Err(e),
        LineKind::Data => {
            answer.push(line);
            Ok(false)
        }
    }
}

/// Default answer parser
///
/// Strips the `<name>: ` prefix the modem puts in front of information text.
/// One line gives [`Value::Line`]; any other count gives [`Value::Lines`].
pub fn parse_answer(command: &str, answer: RawAnswer) -> Value {
    let name = canonical_name(command);
    let mut lines: Vec<String> = answer
        .into_lines()
        .into_iter()
        .map(|line| parse_line(name, line))
        .collect();

    if lines.len() == 1 {
        Value::Line(lines.remove(0))
    } else {
        Value::Lines(lines)
    }
}

fn parse_line(name: &str, line: String) -> String {
    let Some(rest) = line.strip_prefix(name).and_then(|r| r.strip_prefix(':')) else {
        return line;
    };
    match line.split_once(": ") {
        Some((_, value)) => value.trim().to_string(),
        None => rest.trim().to_string(),
    }
}
