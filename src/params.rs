//! Range checks shared by every configurable component.

use crate::error::ConfigError;

fn out_of_range(name: &str, value: f64, range: String) -> ConfigError {
    ConfigError::OutOfRange {
        name: name.to_string(),
        value,
        range,
    }
}

/// Accepts `lo < value < hi`.
pub(crate) fn open(name: &str, value: f64, lo: f64, hi: f64) -> Result<f64, ConfigError> {
    if lo < value && value < hi {
        Ok(value)
    } else {
        Err(out_of_range(name, value, format!("({lo}, {hi})")))
    }
}

/// Accepts `lo < value <= hi`.
pub(crate) fn left_open(name: &str, value: f64, lo: f64, hi: f64) -> Result<f64, ConfigError> {
    if lo < value && value <= hi {
        Ok(value)
    } else {
        Err(out_of_range(name, value, format!("({lo}, {hi}]")))
    }
}

/// Accepts `lo <= value <= hi`.
pub(crate) fn closed(name: &str, value: f64, lo: f64, hi: f64) -> Result<f64, ConfigError> {
    if lo <= value && value <= hi {
        Ok(value)
    } else {
        Err(out_of_range(name, value, format!("[{lo}, {hi}]")))
    }
}

/// Accepts integers in `[lo, hi]`.
pub(crate) fn count(name: &str, value: usize, lo: usize, hi: usize) -> Result<usize, ConfigError> {
    if (lo..=hi).contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range(name, value as f64, format!("[{lo}, {hi}]")))
    }
}

/// Converts a named-parameter value to an integer count in `[lo, hi]`.
pub(crate) fn count_from_f64(
    name: &str,
    value: f64,
    lo: usize,
    hi: usize,
) -> Result<usize, ConfigError> {
    if value.fract() != 0.0 || !(lo as f64 <= value && value <= hi as f64) {
        return Err(out_of_range(name, value, format!("[{lo}, {hi}]")));
    }
    Ok(value as usize)
}

/// Validates a Wolfe pair `0 < c1 < c2 < 1`.
pub(crate) fn tolerance(c1: f64, c2: f64) -> Result<(), ConfigError> {
    if 0.0 < c1 && c1 < c2 && c2 < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Tolerance { c1, c2 })
    }
}
