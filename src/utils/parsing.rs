use serde_json::Value;

/// Converts a JSON Value to f64, accepting numbers and numeric strings.
/// Blank strings and non-finite results are treated as absent.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Converts a JSON Value to u64 millis, accepting integers, floats and numeric strings.
pub fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
        }
        _ => None,
    }
}

/// Converts a JSON Value to String, handling both Number and String types.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn opt_f64(value: &Option<Value>) -> Option<f64> {
    value.as_ref().and_then(value_to_f64)
}

pub fn opt_u64(value: &Option<Value>) -> Option<u64> {
    value.as_ref().and_then(value_to_u64)
}

pub fn opt_string(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(value_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_f64() {
        assert_eq!(value_to_f64(&json!(42.5)), Some(42.5));
        assert_eq!(value_to_f64(&json!("123.456")), Some(123.456));
        assert_eq!(value_to_f64(&json!(" 7 ")), Some(7.0));
        assert_eq!(value_to_f64(&json!("")), None);
        assert_eq!(value_to_f64(&json!("abc")), None);
        assert_eq!(value_to_f64(&json!("NaN")), None);
        assert_eq!(value_to_f64(&json!(null)), None);
    }

    #[test]
    fn test_value_to_u64() {
        assert_eq!(value_to_u64(&json!(123)), Some(123));
        assert_eq!(value_to_u64(&json!("456")), Some(456));
        assert_eq!(value_to_u64(&json!(1.7e12)), Some(1_700_000_000_000));
        assert_eq!(value_to_u64(&json!(-1)), None);
    }

    #[test]
    fn test_optional_helpers() {
        assert_eq!(opt_f64(&None), None);
        assert_eq!(opt_f64(&Some(json!("1.5"))), Some(1.5));
        assert_eq!(opt_string(&Some(json!(5))), Some("5".to_string()));
    }
}
