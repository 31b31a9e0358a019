//! Three-address code in the form of quadruples.
//!
//! The text format holds one quadruple per line, as `op,operand1,operand2,result`.
//! `operand2` is empty for copies such as `=,a,,T1`. Lines end with `\n` or
//! `\r\n`; [`Listing`] remembers which, so that a file is written back in
//! the form it was read.

use std::{fmt, fs, io, path::Path, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quadruple {
    pub op: String,
    pub operand1: String,
    pub operand2: String,
    pub result: String,
}

impl Quadruple {
    pub fn new(
        op: impl Into<String>,
        operand1: impl Into<String>,
        operand2: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            op: op.into(),
            operand1: operand1.into(),
            operand2: operand2.into(),
            result: result.into(),
        }
    }

    /// Create a copy `(=, source, , target)`.
    pub fn copy(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new("=", source, "", target)
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.op, self.operand1, self.operand2, self.result
        )
    }
}

impl FromStr for Quadruple {
    type Err = QuadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.strip_suffix('\r').unwrap_or(s);
        let fields: Vec<&str> = line.split(',').collect();
        match fields[..] {
            [op, operand1, operand2, result] => Ok(Self::new(op, operand1, operand2, result)),
            _ => Err(QuadError::Malformed {
                line: 0,
                text: line.to_owned(),
                fields: fields.len(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuadError {
    #[error("IO error: {}", _0)]
    IO(#[from] io::Error),

    #[error("line {line}: expected 4 comma-separated fields, found {fields}: `{text}'")]
    Malformed {
        line: usize,
        text: String,
        fields: usize,
    },
}

/// Parse the text format. Blank lines are ignored.
pub fn parse(source: &str) -> Result<Vec<Quadruple>, QuadError> {
    let mut quads = vec![];
    for (i, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let quad = line.parse::<Quadruple>().map_err(|err| match err {
            QuadError::Malformed { text, fields, .. } => QuadError::Malformed {
                line: i + 1,
                text,
                fields,
            },
            err => err,
        })?;
        quads.push(quad);
    }
    Ok(quads)
}

/// Serialize the quadruples, each line terminated by a newline.
pub fn to_text(quads: &[Quadruple]) -> String {
    Listing::new(quads.to_vec()).to_string()
}

/// The line terminator of a quadruple file and whether its last line has one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    pub crlf: bool,
    pub final_newline: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            crlf: false,
            final_newline: true,
        }
    }
}

impl Layout {
    /// Detect the layout of the source text from its first line.
    pub fn detect(source: &str) -> Self {
        let crlf = match source.find('\n') {
            Some(end) => source[..end].ends_with('\r'),
            None => false,
        };
        let final_newline = source.is_empty() || source.ends_with('\n');
        Self {
            crlf,
            final_newline,
        }
    }

    fn terminator(&self) -> &'static str {
        if self.crlf {
            "\r\n"
        } else {
            "\n"
        }
    }
}

/// A sequence of quadruples together with the layout of the file it came from.
///
/// Writing back a listing read from text without blank lines reproduces the
/// text exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub quads: Vec<Quadruple>,
    pub layout: Layout,
}

impl Listing {
    pub fn new(quads: Vec<Quadruple>) -> Self {
        Self {
            quads,
            layout: Layout::default(),
        }
    }

    /// Replace the quadruples, keeping the layout.
    pub fn with_quads(&self, quads: Vec<Quadruple>) -> Self {
        Self {
            quads,
            layout: self.layout,
        }
    }
}

impl FromStr for Listing {
    type Err = QuadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            quads: parse(s)?,
            layout: Layout::detect(s),
        })
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terminator = self.layout.terminator();
        for (i, quad) in self.quads.iter().enumerate() {
            if i > 0 {
                f.write_str(terminator)?;
            }
            write!(f, "{}", quad)?;
        }
        if self.layout.final_newline && !self.quads.is_empty() {
            f.write_str(terminator)?;
        }
        Ok(())
    }
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Listing, QuadError> {
    let source = fs::read_to_string(path)?;
    source.parse()
}

pub fn write_file(path: impl AsRef<Path>, listing: &Listing) -> Result<(), QuadError> {
    fs::write(path, listing.to_string())?;
    Ok(())
}
