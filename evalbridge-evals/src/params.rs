//! Metric construction parameters.

use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar construction argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Named construction arguments for a metric.
pub type MetricParams = BTreeMap<String, ParamValue>;

/// Consumes named parameters while a metric is being built.
///
/// Every accessor removes the key it reads; [`ParamReader::finish`] rejects
/// whatever is left over, so misspelled parameters fail loudly.
#[derive(Debug)]
pub struct ParamReader<'a> {
    metric: &'a str,
    remaining: MetricParams,
}

impl<'a> ParamReader<'a> {
    /// Start reading `params` on behalf of `metric`.
    pub fn new(metric: &'a str, params: &MetricParams) -> Self {
        Self {
            metric,
            remaining: params.clone(),
        }
    }

    /// Read a float; integers are widened.
    pub fn float(&mut self, name: &str) -> EvalResult<Option<f64>> {
        match self.remaining.remove(name) {
            None => Ok(None),
            Some(ParamValue::Float(v)) => Ok(Some(v)),
            Some(ParamValue::Int(v)) => Ok(Some(v as f64)),
            Some(other) => Err(self.type_error(name, "a number", &other)),
        }
    }

    /// Read a float that must lie in `[0, 1]`.
    pub fn unit_float(&mut self, name: &str) -> EvalResult<Option<f64>> {
        match self.float(name)? {
            Some(v) if !(0.0..=1.0).contains(&v) => Err(EvalError::invalid_param(
                self.metric,
                name,
                format!("must be between 0 and 1, got {}", v),
            )),
            other => Ok(other),
        }
    }

    /// Read a positive integer.
    pub fn positive_int(&mut self, name: &str) -> EvalResult<Option<usize>> {
        match self.remaining.remove(name) {
            None => Ok(None),
            Some(ParamValue::Int(v)) if v > 0 => Ok(Some(v as usize)),
            Some(other) => Err(self.type_error(name, "a positive integer", &other)),
        }
    }

    /// Read a boolean; `0`/`1` and `"true"`/`"false"` are accepted.
    pub fn bool(&mut self, name: &str) -> EvalResult<Option<bool>> {
        match self.remaining.remove(name) {
            None => Ok(None),
            Some(ParamValue::Bool(v)) => Ok(Some(v)),
            Some(ParamValue::Int(0)) => Ok(Some(false)),
            Some(ParamValue::Int(1)) => Ok(Some(true)),
            Some(ParamValue::Str(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(ParamValue::Str(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(self.type_error(name, "a boolean", &other)),
        }
    }

    /// Read a string.
    pub fn string(&mut self, name: &str) -> EvalResult<Option<String>> {
        match self.remaining.remove(name) {
            None => Ok(None),
            Some(ParamValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(self.type_error(name, "a string", &other)),
        }
    }

    /// Fail if any parameter was not consumed.
    pub fn finish(self) -> EvalResult<()> {
        match self.remaining.into_keys().next() {
            None => Ok(()),
            Some(name) => Err(EvalError::invalid_param(
                self.metric,
                name,
                "unexpected keyword argument",
            )),
        }
    }

    fn type_error(&self, name: &str, expected: &str, got: &ParamValue) -> EvalError {
        EvalError::invalid_param(self.metric, name, format!("expected {}, got {}", expected, got))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(pairs: &[(&str, ParamValue)]) -> MetricParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_untagged_deserialization() {
        let parsed: MetricParams =
            serde_json::from_str(r#"{"a": 1, "b": 0.5, "c": "x", "d": true}"#).unwrap();
        assert_eq!(parsed["a"], ParamValue::Int(1));
        assert_eq!(parsed["b"], ParamValue::Float(0.5));
        assert_eq!(parsed["c"], ParamValue::Str("x".into()));
        assert_eq!(parsed["d"], ParamValue::Bool(true));
    }

    #[test]
    fn test_float_widens_int() {
        let p = params(&[("threshold", ParamValue::Int(1))]);
        let mut reader = ParamReader::new("m", &p);
        assert_eq!(reader.unit_float("threshold").unwrap(), Some(1.0));
        reader.finish().unwrap();
    }

    #[test]
    fn test_unit_float_out_of_range() {
        let p = params(&[("threshold", ParamValue::Float(1.5))]);
        let mut reader = ParamReader::new("m", &p);
        assert!(reader.unit_float("threshold").is_err());
    }

    #[rstest]
    #[case(ParamValue::Bool(true), true)]
    #[case(ParamValue::Int(0), false)]
    #[case(ParamValue::Str("TRUE".into()), true)]
    #[case(ParamValue::Str("false".into()), false)]
    fn test_bool_coercion(#[case] value: ParamValue, #[case] expected: bool) {
        let p = params(&[("strict_mode", value)]);
        let mut reader = ParamReader::new("m", &p);
        assert_eq!(reader.bool("strict_mode").unwrap(), Some(expected));
    }

    #[test]
    fn test_wrong_type() {
        let p = params(&[("threshold", ParamValue::Str("high".into()))]);
        let mut reader = ParamReader::new("Bias", &p);
        let err = reader.float("threshold").unwrap_err();
        assert!(err.to_string().contains("expected a number"));
    }

    #[test]
    fn test_unknown_param_rejected() {
        let p = params(&[("treshold", ParamValue::Float(0.7))]);
        let mut reader = ParamReader::new("Bias", &p);
        assert_eq!(reader.float("threshold").unwrap(), None);
        let err = reader.finish().unwrap_err();
        assert!(err.to_string().contains("treshold"));
        assert!(err.to_string().contains("unexpected keyword argument"));
    }
}
