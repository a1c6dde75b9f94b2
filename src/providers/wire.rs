//! Lenient decoders for provider JSON
//!
//! Providers disagree on whether amounts and ids are strings or numbers,
//! sometimes within one API. These helpers accept either.

use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use crate::models::Vnd;

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Number as an `i64`, or `None` when it does not fit
///
/// `whole` also rejects fractions; otherwise they are truncated.
fn number_to_i64(n: &Number, whole: bool) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| !whole || f.fract() == 0.0)
            .map(f64::trunc)
            .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn value_to_vnd(value: &Value) -> Result<Option<Vnd>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => number_to_i64(n, true)
            .map(|v| Some(Vnd::new(v)))
            .ok_or_else(|| format!("amount {} is not a whole number in range", n)),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Vnd::parse(s).map(Some).map_err(|e| e.to_string()),
        other => Err(format!("amount has unexpected type: {}", other)),
    }
}

/// Required amount, string or number
pub fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Vnd, D::Error> {
    let value = Value::deserialize(d)?;
    value_to_vnd(&value)
        .map_err(serde::de::Error::custom)?
        .ok_or_else(|| serde::de::Error::custom("amount is missing"))
}

/// Optional amount, string or number
pub fn de_opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vnd>, D::Error> {
    let value = Value::deserialize(d)?;
    value_to_vnd(&value).map_err(serde::de::Error::custom)
}

/// Optional string that may arrive as a number
pub fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value_to_string(&value).filter(|s| !s.is_empty()))
}

/// Optional integer that may arrive as a string
pub fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => number_to_i64(&n, false)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("{} is not an integer in range", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not an integer", s))),
        other => Err(serde::de::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

/// Integer result code that may arrive as a string
pub fn de_code<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    de_opt_i64(d)?.ok_or_else(|| serde::de::Error::custom("result code is missing"))
}

/// Render a JSON value the way a provider put it in its signed string
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "de_amount")]
        amount: Vnd,
        #[serde(default, deserialize_with = "de_opt_string")]
        id: Option<String>,
        #[serde(default, deserialize_with = "de_opt_i64")]
        reading: Option<i64>,
        #[serde(deserialize_with = "de_code")]
        code: i64,
    }

    #[test]
    fn test_numbers_and_strings() {
        let a: Sample =
            serde_json::from_str(r#"{"amount":"450000","id":12345,"reading":"512","code":"0"}"#)
                .unwrap();
        assert_eq!(a.amount, Vnd::new(450_000));
        assert_eq!(a.id.as_deref(), Some("12345"));
        assert_eq!(a.reading, Some(512));
        assert_eq!(a.code, 0);

        let b: Sample = serde_json::from_str(r#"{"amount":450000.0,"code":1}"#).unwrap();
        assert_eq!(b.amount, Vnd::new(450_000));
        assert_eq!(b.id, None);
        assert_eq!(b.reading, None);
    }

    #[test]
    fn test_bad_amount() {
        assert!(serde_json::from_str::<Sample>(r#"{"amount":"lots","code":0}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"amount":null,"code":0}"#).is_err());
    }

    #[test]
    fn test_out_of_range_numbers_rejected() {
        assert!(serde_json::from_str::<Sample>(r#"{"amount":1e300,"code":0}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"amount":18446744073709551615,"code":0}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"amount":1000,"code":1e300}"#).is_err());
        assert!(
            serde_json::from_str::<Sample>(r#"{"amount":1000,"reading":-1e19,"code":0}"#).is_err()
        );
        assert!(serde_json::from_str::<Sample>(r#"{"amount":1000.5,"code":0}"#).is_err());

        let ok: Sample = serde_json::from_str(r#"{"amount":5e4,"reading":250.7,"code":0}"#).unwrap();
        assert_eq!(ok.amount, Vnd::new(50_000));
        assert_eq!(ok.reading, Some(250));
    }

    #[test]
    fn test_canonical_value() {
        assert_eq!(canonical_value(&serde_json::json!("abc")), "abc");
        assert_eq!(canonical_value(&serde_json::json!(50000)), "50000");
        assert_eq!(canonical_value(&serde_json::json!([1, 2])), "[1,2]");
    }
}
