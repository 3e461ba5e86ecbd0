//! Program-type classification for contract executions.

use serde_json::Value;

/// Derive a program type from a contract execute message.
///
/// - `{"swap": {"program_type": "amm"}}` → `"swap:amm"` (also reads `"type"`)
/// - `{"swap": {...}}` → `"swap"`
/// - more than one top-level key → `"multi"`
/// - anything else → `None`
pub fn classify_program(msg: &Value) -> Option<String> {
    let obj = msg.as_object()?;
    let mut keys = obj.iter();
    let (key, inner) = keys.next()?;
    if keys.next().is_some() {
        return Some("multi".to_string());
    }
    let sub_type = inner
        .get("program_type")
        .or_else(|| inner.get("type"))
        .and_then(Value::as_str);
    Some(match sub_type {
        Some(t) => format!("{key}:{t}"),
        None => key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_key() {
        assert_eq!(classify_program(&json!({"swap": {"amount": "1"}})), Some("swap".into()));
    }

    #[test]
    fn single_key_with_sub_type() {
        assert_eq!(
            classify_program(&json!({"execute": {"program_type": "limit"}})),
            Some("execute:limit".into())
        );
        assert_eq!(
            classify_program(&json!({"execute": {"type": "market"}})),
            Some("execute:market".into())
        );
    }

    #[test]
    fn multiple_keys() {
        assert_eq!(classify_program(&json!({"a": 1, "b": 2})), Some("multi".into()));
    }

    #[test]
    fn unclassifiable() {
        assert_eq!(classify_program(&json!({})), None);
        assert_eq!(classify_program(&json!("swap")), None);
        assert_eq!(classify_program(&Value::Null), None);
    }

    #[test]
    fn deterministic() {
        let msg = json!({"swap": {"type": "amm"}});
        assert_eq!(classify_program(&msg), classify_program(&msg));
    }
}
