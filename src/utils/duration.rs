//! Duration-string parsing for manifest timeouts.
//!
//! Accepts the common suffix forms found in manifests: `"500ms"`, `"10s"`,
//! `"2m"`, `"1h"`, and concatenations like `"1m30s"`. Fractional values
//! (`"1.5s"`) are supported.

use std::time::Duration;

use crate::error::{Result, SwitchboardError};

/// Parse a duration string like `"10s"` or `"1m30s"`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(SwitchboardError::Validation(
            "empty duration string".to_string(),
        ));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| {
                SwitchboardError::Validation(format!("duration '{}' is missing a unit", input))
            })?;
        if digits_end == 0 {
            return Err(SwitchboardError::Validation(format!(
                "invalid duration: {}",
                input
            )));
        }

        let value: f64 = rest[..digits_end].parse().map_err(|_| {
            SwitchboardError::Validation(format!("invalid duration number in '{}'", input))
        })?;

        let unit_end = rest[digits_end..]
            .find(|c: char| c.is_ascii_digit())
            .map(|i| digits_end + i)
            .unwrap_or(rest.len());
        let unit = &rest[digits_end..unit_end];

        let millis = match unit {
            "ms" => value,
            "s" => value * 1_000.0,
            "m" => value * 60_000.0,
            "h" => value * 3_600_000.0,
            other => {
                return Err(SwitchboardError::Validation(format!(
                    "unknown duration unit '{}' in '{}'",
                    other, input
                )))
            }
        };
        total += Duration::from_millis(millis as u64);
        rest = &rest[unit_end..];
    }

    Ok(total)
}
