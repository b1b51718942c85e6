//! Command-line define overrides: `NAME=VALUE[,VALUE...]`.
//!
//! Each value is an integer literal (decimal, `0x`, `0o` or `0b`, with an
//! optional sign) or a half-open `range(stop)`, `range(start,stop)` or
//! `range(start,stop,step)`. An override with several values becomes one
//! more swept dimension of the permutation space.

use std::fmt;
use std::str::FromStr;

use lfsperm_error::{PermError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on the values one override may expand to.
pub const MAX_OVERRIDE_VALUES: usize = 1 << 16;

/// One parsed override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineOverride {
    pub name: String,
    pub values: Vec<i64>,
}

impl DefineOverride {
    #[must_use]
    pub fn new(name: impl Into<String>, values: impl Into<Vec<i64>>) -> Self {
        Self {
            name: name.into(),
            values: values.into(),
        }
    }

    /// Parse a `;`-separated list, as carried by an environment variable.
    pub fn parse_many(list: &str) -> Result<Vec<Self>> {
        list.split(';')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for DefineOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.name)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

impl FromStr for DefineOverride {
    type Err = PermError;

    fn from_str(spec: &str) -> Result<Self> {
        let (name, rest) = spec
            .split_once('=')
            .ok_or_else(|| PermError::invalid_override(spec, "expected NAME=VALUE"))?;
        let name = name.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PermError::invalid_override(spec, "bad define name"));
        }

        let mut values = Vec::new();
        for item in split_top_level(rest) {
            let item = item.trim();
            if item.is_empty() {
                return Err(PermError::invalid_override(spec, "empty value"));
            }
            if let Some(args) = item
                .strip_prefix("range(")
                .and_then(|tail| tail.strip_suffix(')'))
            {
                expand_range(spec, args, &mut values)?;
            } else {
                let value =
                    parse_int(item).map_err(|detail| PermError::invalid_override(spec, detail))?;
                values.push(value);
            }
            if values.len() > MAX_OVERRIDE_VALUES {
                return Err(PermError::invalid_override(
                    spec,
                    format!("more than {MAX_OVERRIDE_VALUES} values"),
                ));
            }
        }

        if values.is_empty() {
            return Err(PermError::invalid_override(spec, "no values"));
        }
        Ok(Self {
            name: name.to_owned(),
            values,
        })
    }
}

/// Split on commas that are not inside parentheses.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

fn expand_range(spec: &str, args: &str, values: &mut Vec<i64>) -> Result<()> {
    let args = args
        .split(',')
        .map(|arg| parse_int(arg.trim()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|detail| PermError::invalid_override(spec, detail))?;
    let (start, stop, step) = match args.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(PermError::invalid_override(
                spec,
                "range takes 1 to 3 arguments",
            ));
        }
    };
    if step == 0 {
        return Err(PermError::invalid_override(spec, "range step is zero"));
    }

    let mut value = start;
    while (step > 0 && value < stop) || (step < 0 && value > stop) {
        if values.len() >= MAX_OVERRIDE_VALUES {
            return Err(PermError::invalid_override(
                spec,
                format!("more than {MAX_OVERRIDE_VALUES} values"),
            ));
        }
        values.push(value);
        let Some(next) = value.checked_add(step) else {
            break;
        };
        value = next;
    }
    Ok(())
}

/// Parse an integer literal with an optional sign and radix prefix.
pub fn parse_int(literal: &str) -> std::result::Result<i64, String> {
    let (negative, unsigned) = match literal.as_bytes().first() {
        Some(b'-') => (true, &literal[1..]),
        Some(b'+') => (false, &literal[1..]),
        _ => (false, literal),
    };
    let (radix, digits) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        Some("0o" | "0O") => (8, &unsigned[2..]),
        Some("0b" | "0B") => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };
    let magnitude = u64::from_str_radix(digits, radix)
        .map_err(|err| format!("bad integer '{literal}': {err}"))?;
    let value = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(value).map_err(|_| format!("integer '{literal}' out of range"))
}
