//! Typed access to bound arguments.
//!
//! Conversion failures are reported, never papered over with a default:
//! a handler asking for `u64` out of `"abc"` is a caller error (400), not
//! a zero.

use crate::error::BindingError;
use crate::handler::{ArgValue, Args};

/// Types that can be parsed out of a text argument.
pub trait FromArg: Sized {
    fn from_arg(text: &str) -> Result<Self, String>;
}

impl FromArg for String {
    fn from_arg(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }
}

macro_rules! from_arg_via_parse {
    ($($ty:ty),+) => {
        $(impl FromArg for $ty {
            fn from_arg(text: &str) -> Result<Self, String> {
                text.parse::<$ty>().map_err(|e| e.to_string())
            }
        })+
    };
}

from_arg_via_parse!(i32, i64, u32, u64, usize, f64, bool);

impl Args {
    /// Parse a required argument. Missing or unparseable values are
    /// binding errors (400 at the adapter boundary).
    pub fn parse<T: FromArg>(&self, name: &str) -> Result<T, BindingError> {
        match self.get(name) {
            None => Err(BindingError::Missing {
                origin: "argument",
                name: name.to_string(),
            }),
            Some(ArgValue::Json(_)) => Err(BindingError::Invalid {
                origin: "argument",
                name: name.to_string(),
                value: "<json>".to_string(),
                reason: "body arguments are accessed with Args::json".to_string(),
            }),
            Some(ArgValue::Text(text)) => {
                T::from_arg(text).map_err(|reason| BindingError::Invalid {
                    origin: "argument",
                    name: name.to_string(),
                    value: text.clone(),
                    reason,
                })
            }
        }
    }

    /// Parse an optional argument; absence is `Ok(None)`, an unparseable
    /// present value is still an error.
    pub fn parse_opt<T: FromArg>(&self, name: &str) -> Result<Option<T>, BindingError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.parse(name).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Args {
        let mut a = Args::default();
        for (k, v) in pairs {
            a.push(k.to_string(), ArgValue::Text(v.to_string()));
        }
        a
    }

    #[test]
    fn parses_numeric_arguments() {
        let a = args(&[("id", "42"), ("ratio", "0.5"), ("flag", "true")]);
        assert_eq!(a.parse::<u64>("id").unwrap(), 42);
        assert_eq!(a.parse::<f64>("ratio").unwrap(), 0.5);
        assert!(a.parse::<bool>("flag").unwrap());
    }

    #[test]
    fn unparseable_value_is_invalid_not_zero() {
        let a = args(&[("id", "abc")]);
        let err = a.parse::<u64>("id").unwrap_err();
        assert!(matches!(err, BindingError::Invalid { .. }));
    }

    #[test]
    fn missing_required_is_reported() {
        let a = args(&[]);
        assert!(matches!(
            a.parse::<String>("id"),
            Err(BindingError::Missing { .. })
        ));
    }

    #[test]
    fn optional_absence_is_none() {
        let a = args(&[]);
        assert_eq!(a.parse_opt::<u32>("limit").unwrap(), None);
        let a = args(&[("limit", "10")]);
        assert_eq!(a.parse_opt::<u32>("limit").unwrap(), Some(10));
    }
}
