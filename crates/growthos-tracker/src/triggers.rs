//! Declarative click tracking via `data-growthos` attributes.

use serde_json::{Map, Number, Value};

const TRIGGER_ATTR: &str = "data-growthos";
const FIELD_PREFIX: &str = "data-growthos-";

/// One node on the path from a click target up to the document root.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn is_body(&self) -> bool {
        self.tag == "body"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub event_type: String,
    pub data: Map<String, Value>,
}

fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Walk `path` (target first, ancestors after) and return the first trigger
/// found below `<body>`.
pub fn find_trigger(path: &[Element]) -> Option<Trigger> {
    let element = path
        .iter()
        .take_while(|el| !el.is_body())
        .find(|el| el.attribute(TRIGGER_ATTR).is_some_and(|t| !t.is_empty()))?;

    let event_type = element.attribute(TRIGGER_ATTR)?.to_string();
    let data = element
        .attributes
        .iter()
        .filter_map(|(name, value)| {
            let field = name.strip_prefix(FIELD_PREFIX)?;
            Some((field.replace('-', "_"), coerce(value)))
        })
        .collect();
    Some(Trigger { event_type, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nearest_ancestor_trigger_with_coerced_fields() {
        let path = vec![
            Element::new("span", &[]),
            Element::new(
                "button",
                &[
                    ("data-growthos", "checkout_started"),
                    ("data-growthos-gross-value", "49.90"),
                    ("data-growthos-installments", "3"),
                    ("data-growthos-product-name", "Pro plan"),
                    ("class", "btn"),
                ],
            ),
            Element::new("div", &[("data-growthos", "outer")]),
            Element::new("body", &[]),
        ];
        let trigger = find_trigger(&path).unwrap();
        assert_eq!(trigger.event_type, "checkout_started");
        assert_eq!(
            Value::Object(trigger.data),
            json!({"gross_value": 49.9, "installments": 3, "product_name": "Pro plan"})
        );
    }

    #[test]
    fn body_and_above_are_ignored() {
        let path = vec![
            Element::new("a", &[]),
            Element::new("body", &[("data-growthos", "signup")]),
            Element::new("html", &[("data-growthos", "signup")]),
        ];
        assert_eq!(find_trigger(&path), None);
    }

    #[test]
    fn non_numeric_values_stay_strings() {
        assert_eq!(coerce("12abc"), json!("12abc"));
        assert_eq!(coerce("NaN"), json!("NaN"));
        assert_eq!(coerce("-5"), json!(-5));
    }

    #[test]
    fn partially_numeric_attributes_are_not_truncated() {
        let path = vec![Element::new(
            "a",
            &[
                ("data-growthos", "lead"),
                ("data-growthos-amount", "12abc"),
                ("data-growthos-quantity", " 12 "),
            ],
        )];
        let trigger = find_trigger(&path).unwrap();
        assert_eq!(trigger.data["amount"], json!("12abc"));
        assert_eq!(trigger.data["quantity"], json!(12));
    }
}
