//! String-to-type conversion for step variables
//!
//! Step variables are always strings in the procedure file. Handlers that
//! want numbers, flags, durations or lists convert them through these helpers.

use std::time::Duration;
use thiserror::Error;

/// A variable value that could not be converted to the requested type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Could not convert '{value}' to type '{target}'")]
    InvalidValue { value: String, target: &'static str },

    #[error("Could not parse unit '{0}'. Must be one of: 'ms', 's', 'm'")]
    InvalidUnit(String),
}

impl ConversionError {
    fn invalid(value: &str, target: &'static str) -> Self {
        ConversionError::InvalidValue {
            value: value.to_string(),
            target,
        }
    }
}

pub fn to_integer(value: &str) -> Result<i64, ConversionError> {
    value
        .parse::<i64>()
        .map_err(|_| ConversionError::invalid(value, "int"))
}

pub fn to_f32(value: &str) -> Result<f32, ConversionError> {
    value
        .parse::<f32>()
        .map_err(|_| ConversionError::invalid(value, "float32"))
}

pub fn to_f64(value: &str) -> Result<f64, ConversionError> {
    value
        .parse::<f64>()
        .map_err(|_| ConversionError::invalid(value, "float64"))
}

/// Parse a boolean.
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false
/// counterparts `0`, `f`, `F`, `FALSE`, `false`, `False`.
pub fn to_boolean(value: &str) -> Result<bool, ConversionError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(ConversionError::invalid(value, "bool")),
    }
}

/// Parse a duration written as an integer followed by a unit.
///
/// Supported units are `ms`, `s` and `m`, so `5m` is five minutes and
/// `250ms` a quarter of a second.
pub fn to_duration(value: &str) -> Result<Duration, ConversionError> {
    let (digits, unit): (String, String) = value.chars().partition(|c| c.is_ascii_digit());

    let unit_millis: u64 = match unit.as_str() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        _ => return Err(ConversionError::InvalidUnit(unit)),
    };

    let amount = digits
        .parse::<u64>()
        .map_err(|_| ConversionError::invalid(value, "duration"))?;

    let millis = amount
        .checked_mul(unit_millis)
        .ok_or_else(|| ConversionError::invalid(value, "duration"))?;

    Ok(Duration::from_millis(millis))
}

/// Split a comma separated value. No trimming is applied.
pub fn to_string_list(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

fn to_list<T>(
    value: &str,
    target: &'static str,
    convert: fn(&str) -> Result<T, ConversionError>,
) -> Result<Vec<T>, ConversionError> {
    value
        .split(',')
        .map(convert)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConversionError::invalid(value, target))
}

pub fn to_integer_list(value: &str) -> Result<Vec<i64>, ConversionError> {
    to_list(value, "[]int", to_integer)
}

pub fn to_f32_list(value: &str) -> Result<Vec<f32>, ConversionError> {
    to_list(value, "[]float32", to_f32)
}

pub fn to_f64_list(value: &str) -> Result<Vec<f64>, ConversionError> {
    to_list(value, "[]float64", to_f64)
}

pub fn to_boolean_list(value: &str) -> Result<Vec<bool>, ConversionError> {
    to_list(value, "[]bool", to_boolean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(to_integer("42"), Ok(42));
        assert_eq!(to_integer("-7"), Ok(-7));
        assert!(to_integer("4.2").is_err());
        assert_eq!(to_f64("0.5"), Ok(0.5));
        assert_eq!(to_f32("1.25"), Ok(1.25));
        assert!(to_f64("half").is_err());
    }

    #[test]
    fn test_boolean_spellings() {
        for truthy in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(to_boolean(truthy), Ok(true), "{}", truthy);
        }
        for falsy in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(to_boolean(falsy), Ok(false), "{}", falsy);
        }
        assert!(to_boolean("yes").is_err());
    }

    #[test]
    fn test_durations() {
        assert_eq!(to_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(to_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(to_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(
            to_duration("3h"),
            Err(ConversionError::InvalidUnit("h".to_string()))
        );
        assert!(to_duration("s").is_err());
    }

    #[test]
    fn test_duration_overflow_is_rejected() {
        assert_eq!(
            to_duration("999999999999999999m"),
            Err(ConversionError::InvalidValue {
                value: "999999999999999999m".to_string(),
                target: "duration",
            })
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(to_integer_list("1,2,3"), Ok(vec![1, 2, 3]));
        assert_eq!(to_boolean_list("true,F"), Ok(vec![true, false]));
        assert_eq!(to_string_list("a,b"), vec!["a".to_string(), "b".to_string()]);

        let err = to_integer_list("1,two").unwrap_err();
        assert_eq!(err.to_string(), "Could not convert '1,two' to type '[]int'");
    }
}
