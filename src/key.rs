//! Key derivation from rows.
//!
//! A [`KeyTemplate`] turns a row into the string key that identifies its
//! aggregate bucket. Templates use `{field}` placeholders; a list of field
//! names is shorthand for the colon-joined template (`["a", "b"]` becomes
//! `"{a}:{b}"`). Formatting is pure: two rows with identical values at the
//! referenced fields always produce identical keys.

use serde_json::Value;

use crate::config::KeySpec;
use crate::error::{JoinError, JoinResult};
use crate::types::Row;

/// A compiled key template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    template: String,
}

impl KeyTemplate {
    /// Compile a [`KeySpec`] into a template.
    pub fn new(spec: &KeySpec) -> Self {
        let template = match spec {
            KeySpec::Template(t) => t.clone(),
            KeySpec::Fields(names) => names
                .iter()
                .map(|n| format!("{{{n}}}"))
                .collect::<Vec<_>>()
                .join(":"),
        };
        Self { template }
    }

    /// Format the template against a row, substituting each referenced
    /// field's value as text.
    ///
    /// `{{` and `}}` escape literal braces. Referencing a field absent from
    /// the row is a [`JoinError::MissingField`].
    pub fn format(&self, row: &Row) -> JoinResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => field.push(c),
                            None => {
                                // Unterminated placeholder: treat the rest as
                                // the field name, which then fails the lookup.
                                break;
                            }
                        }
                    }
                    match row.get(&field) {
                        Some(value) => push_value_text(&mut out, value),
                        None => return Err(JoinError::MissingField { field }),
                    }
                }
                c => out.push(c),
            }
        }

        Ok(out)
    }
}

/// Append a value's text form: strings verbatim, numbers/bools via `Display`,
/// null as empty, and nested structures as compact JSON.
fn push_value_text(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::KeyTemplate;
    use crate::config::KeySpec;
    use crate::error::JoinError;
    use crate::types::Row;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn field_list_becomes_colon_joined_template() {
        let template = KeyTemplate::new(&KeySpec::Fields(vec![
            "region".to_string(),
            "sku".to_string(),
        ]));
        let key = template
            .format(&row(serde_json::json!({"region": "eu", "sku": 42})))
            .unwrap();
        assert_eq!(key, "eu:42");
    }

    #[test]
    fn identical_referenced_values_produce_identical_keys() {
        let template = KeyTemplate::new(&KeySpec::Template("{a}-{b}".to_string()));
        let k1 = template
            .format(&row(serde_json::json!({"a": 1, "b": "x", "extra": true})))
            .unwrap();
        let k2 = template
            .format(&row(serde_json::json!({"b": "x", "a": 1, "other": null})))
            .unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn missing_referenced_field_is_an_error() {
        let template = KeyTemplate::new(&KeySpec::Template("{absent}".to_string()));
        let err = template
            .format(&row(serde_json::json!({"present": 1})))
            .unwrap_err();
        assert!(matches!(err, JoinError::MissingField { field } if field == "absent"));
    }

    #[test]
    fn doubled_braces_are_literals() {
        let template = KeyTemplate::new(&KeySpec::Template("{{{a}}}".to_string()));
        let key = template.format(&row(serde_json::json!({"a": "x"}))).unwrap();
        assert_eq!(key, "{x}");
    }
}
