//! AT command formatting

use std::fmt;

/// Command terminator
pub const CR: char = '\r';

/// A single AT command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Rendered with its decimal representation
    Int(i64),
    /// Rendered between double quotes, without escaping
    Str(String),
    /// Elements rendered and joined with `,`
    List(Vec<Arg>),
}

impl Arg {
    /// Wire representation of this argument
    pub fn encode(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Str(s) => format!("\"{s}\""),
            Self::List(items) => encode_args(items),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Arg {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

fn encode_args(args: &[Arg]) -> String {
    args.iter().map(Arg::encode).collect::<Vec<_>>().join(",")
}

/// Render `name` and `args` into the wire string `AT<name><args>\r`
///
/// Carriage returns inside the name or the arguments are dropped, so the
/// only CR in the output is the terminator.
pub fn format_command(name: &str, args: &[Arg]) -> String {
    let body: String = format!("AT{name}{}", encode_args(args))
        .chars()
        .filter(|&c| c != CR)
        .collect();
    format!("{body}{CR}")
}

/// An AT command: name (without the `AT` prefix) plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    /// Command without arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Command name, e.g. `+CMEE=`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments in order
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Name with one trailing `?` and then one trailing `=` removed
    ///
    /// This is the prefix the modem echoes in front of its answer:
    /// `+CPBR=?` answers with `+CPBR: ...`.
    pub fn canonical_name(&self) -> &str {
        canonical_name(&self.name)
    }

    /// Wire string for this command
    pub fn to_wire(&self) -> String {
        format_command(&self.name, &self.args)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AT{}{}", self.name, encode_args(&self.args))
    }
}

pub(crate) fn canonical_name(name: &str) -> &str {
    let name = name.strip_suffix('?').unwrap_or(name);
    name.strip_suffix('=').unwrap_or(name)
}
