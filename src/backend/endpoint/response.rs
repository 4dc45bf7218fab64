//! Normalise the many response shapes image-to-text servers return.
//!
//! Depending on the server and task, the text can arrive as
//! `[{"generated_text": "..."}]`, `{"text": "..."}`, a bare JSON string, or a
//! plain-text body. All of these collapse to a single `String`.

use serde_json::Value;

/// Keys checked, in order, when the response is an object.
const TEXT_KEYS: [&str; 3] = ["generated_text", "text", "caption"];

/// Pull the recognised text out of an endpoint response.
///
/// * array → first element (empty array → `""`)
/// * object → first non-empty of `generated_text`, `text`, `caption`, else `""`
/// * string → itself; null → `""`; any other scalar → its JSON text
pub fn extract_generated_text(response: &Value) -> String {
    let item = match response {
        Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return String::new(),
        },
        other => other,
    };

    match item {
        Value::Object(map) => TEXT_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find(|v| is_truthy(v))
            .map(stringify)
            .unwrap_or_default(),
        Value::Null => String::new(),
        other => stringify(other),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_of_objects_uses_first() {
        let v = json!([{"generated_text": "page one"}, {"generated_text": "ignored"}]);
        assert_eq!(extract_generated_text(&v), "page one");
    }

    #[test]
    fn empty_list_is_empty_text() {
        assert_eq!(extract_generated_text(&json!([])), "");
    }

    #[test]
    fn object_key_priority() {
        assert_eq!(
            extract_generated_text(&json!({"caption": "c", "text": "t"})),
            "t"
        );
        assert_eq!(
            extract_generated_text(&json!({"generated_text": "", "caption": "c"})),
            "c"
        );
        assert_eq!(extract_generated_text(&json!({"other": "x"})), "");
    }

    #[test]
    fn non_string_values_are_stringified() {
        assert_eq!(extract_generated_text(&json!({"text": 42})), "42");
        assert_eq!(extract_generated_text(&json!({"text": 0, "caption": "c"})), "c");
    }

    #[test]
    fn scalars() {
        assert_eq!(extract_generated_text(&json!("plain")), "plain");
        assert_eq!(extract_generated_text(&Value::Null), "");
        assert_eq!(extract_generated_text(&json!(3.5)), "3.5");
        assert_eq!(extract_generated_text(&json!(["first", "second"])), "first");
    }
}
