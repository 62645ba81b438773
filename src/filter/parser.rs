//! Record parsers for curl's two progress layouts.
//!
//! Meter (default):
//! ```text
//!   % Total    % Received % Xferd  Average Speed   Time    Time     Time  Current
//!                                  Dload  Upload   Total   Spent    Left  Speed
//!  28 20.0M   28 5936k    0     0  2970k      0  0:00:06  0:00:01  0:00:05 2969k
//! ```
//!
//! Bar (`curl -#`):
//! ```text
//! ############################################                              61,1%
//! ```

use std::io::{self, Write};

/// Sent to zenity once the transfer is over so `--auto-close` dismisses the dialog.
pub const COMPLETION_LINE: &[u8] = b"100\n";

const METER_PERCENT_WIDTH: usize = 4;
const METER_SPEED_WIDTH: usize = 7;
const BAR_TAIL_WIDTH: usize = 6;

/// Which curl layout the session parses; fixed for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressFormat {
    #[default]
    Meter,
    Bar,
}

impl ProgressFormat {
    pub fn parse(self, record: &[u8]) -> Option<ProgressUpdate> {
        match self {
            ProgressFormat::Meter => parse_meter(record),
            ProgressFormat::Bar => parse_bar(record),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProgressFormat::Meter => "meter",
            ProgressFormat::Bar => "bar",
        }
    }
}

/// Parsed progress: a percentage in `0..=100` and, for the meter, the current speed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    percent: u8,
    throughput: Option<String>,
}

impl ProgressUpdate {
    /// Returns `None` when `percent` is above 100.
    pub fn new(percent: u32, throughput: Option<String>) -> Option<Self> {
        let percent = u8::try_from(percent).ok().filter(|p| *p <= 100)?;
        Some(Self {
            percent,
            throughput,
        })
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn throughput(&self) -> Option<&str> {
        self.throughput.as_deref()
    }

    /// Emit the zenity protocol pair: the bare level, then a `#` status text line.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let percent = self.percent;
        match self.throughput.as_deref() {
            Some(speed) => write!(out, "{percent}\n# {percent}% ({speed}/s)\n"),
            None => write!(out, "{percent}\n# {percent}%\n"),
        }
    }
}

/// Parse a meter row. The first four columns hold the total percent; a zero there
/// (curl's startup rows) yields nothing. The speed is the last column.
pub fn parse_meter(line: &[u8]) -> Option<ProgressUpdate> {
    let split = line.len().min(METER_PERCENT_WIDTH);
    let percent = leading_int(&line[..split])?;
    if percent == 0 {
        return None;
    }
    ProgressUpdate::new(percent, last_column(&line[split..]))
}

/// Parse a bar row, which must end in `NN,N%`; anything else is ignored.
pub fn parse_bar(line: &[u8]) -> Option<ProgressUpdate> {
    let tail_start = line.len().checked_sub(BAR_TAIL_WIDTH)?;
    let tail = &line[tail_start..];
    if tail[3] != b',' || tail[5] != b'%' {
        return None;
    }
    ProgressUpdate::new(leading_int(&tail[..3])?, None)
}

/// `atoi` over a fixed-width field: leading blanks, then digits up to the first
/// non-digit. `None` when no digit follows the blanks.
fn leading_int(field: &[u8]) -> Option<u32> {
    let digits: Vec<u8> = field
        .iter()
        .skip_while(|byte| byte.is_ascii_whitespace())
        .take_while(|byte| byte.is_ascii_digit())
        .copied()
        .collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.iter().fold(0u32, |acc, digit| {
        acc.saturating_mul(10).saturating_add(u32::from(digit - b'0'))
    }))
}

/// Rightmost blank-delimited token, capped to the width of curl's speed column.
fn last_column(rest: &[u8]) -> Option<String> {
    let end = rest
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())?
        + 1;
    let trimmed = &rest[..end];
    let start = trimmed
        .iter()
        .rposition(|byte| byte.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    let start = start.max(end.saturating_sub(METER_SPEED_WIDTH));
    Some(String::from_utf8_lossy(&trimmed[start..]).into_owned())
}
