//! Turning change occurrences into logical field values

use std::rc::Rc;

use serde_json::Value;

use crate::event::{ChangeEvent, ControlType, EventTarget, InputEvent, Platform, SelectOption};

/// Converts a value coming from the UI into the value stored in the form.
pub type Parse = Rc<dyn Fn(Option<Value>, &str) -> Option<Value>>;

/// Converts a stored value into the value shown by the UI.
pub type Format = Rc<dyn Fn(Option<&Value>, &str) -> Option<Value>>;

/// Empty text means "no value".
pub fn default_parse(value: Option<Value>, _name: &str) -> Option<Value> {
    match value {
        Some(Value::String(s)) if s.is_empty() => None,
        other => other,
    }
}

/// No value is shown as empty text.
pub fn default_format(value: Option<&Value>, _name: &str) -> Option<Value> {
    match value {
        None => Some(Value::String(String::new())),
        Some(value) => Some(value.clone()),
    }
}

/// Derive the logical value carried by a change occurrence.
///
/// `current` is the field's current value and `pinned` the value a checkbox
/// stands for when several checkboxes share one field name.
pub fn get_value(
    event: &ChangeEvent,
    current: Option<&Value>,
    pinned: Option<&Value>,
    platform: Platform,
) -> Option<Value> {
    match event {
        ChangeEvent::Value(value) => value.clone(),
        ChangeEvent::Input(input) => unpack_input(input, current, pinned, platform),
    }
}

fn unpack_input(
    input: &InputEvent,
    current: Option<&Value>,
    pinned: Option<&Value>,
    platform: Platform,
) -> Option<Value> {
    if let Some(text) = &input.native_text {
        return Some(Value::String(text.clone()));
    }
    // native runtimes only ever report through the text payload
    if platform == Platform::Native {
        return None;
    }
    let target = input.target.as_ref()?;
    unpack_target(target, current, pinned)
}

fn unpack_target(
    target: &EventTarget,
    current: Option<&Value>,
    pinned: Option<&Value>,
) -> Option<Value> {
    match target.control {
        ControlType::Checkbox => match pinned {
            None => Some(Value::Bool(target.checked)),
            Some(pinned) => toggle_membership(current, pinned, target.checked),
        },
        ControlType::SelectMultiple => Some(selected_values(&target.options)),
        _ => target.value.clone(),
    }
}

fn toggle_membership(current: Option<&Value>, pinned: &Value, checked: bool) -> Option<Value> {
    let Some(Value::Array(items)) = current else {
        return if checked {
            Some(Value::Array(vec![pinned.clone()]))
        } else {
            current.cloned()
        };
    };
    let position = items.iter().position(|item| item == pinned);
    match (checked, position) {
        (true, None) => {
            let mut next = items.clone();
            next.push(pinned.clone());
            Some(Value::Array(next))
        }
        (false, Some(index)) => {
            let mut next = items.clone();
            next.remove(index);
            Some(Value::Array(next))
        }
        _ => current.cloned(),
    }
}

fn selected_values(options: &[SelectOption]) -> Value {
    Value::Array(
        options
            .iter()
            .filter(|option| option.selected)
            .map(|option| option.value.clone())
            .collect(),
    )
}

/// Diagnostic for a grouped control whose field declares no `type`.
///
/// Without the declared type the pinned value cannot be told apart from the
/// field's value, so the unpacked result is a guess. Returns the message to
/// emit, or `None` when the field is unambiguous.
pub fn unpack_warning(
    target: &EventTarget,
    field_type: Option<&ControlType>,
    name: &str,
    value: Option<&Value>,
) -> Option<String> {
    let needs_type = matches!(
        target.control,
        ControlType::Checkbox | ControlType::Radio | ControlType::SelectMultiple
    );
    if !needs_type || field_type.is_some() {
        return None;
    }
    let declared = match target.control {
        ControlType::SelectMultiple => "select",
        ref other => other.as_str(),
    };
    let shown = match value {
        Some(Value::Array(items)) => format!(
            "[{}]",
            items
                .iter()
                .map(display_plain)
                .collect::<Vec<_>>()
                .join(",")
        ),
        Some(value) => format!("\"{}\"", display_plain(value)),
        None => "\"undefined\"".to_string(),
    };
    Some(format!(
        "You must pass `type=\"{declared}\"` prop to your Field({name}) component.\n\
         Without it we don't know how to unpack your `value` prop - {shown}."
    ))
}

fn display_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn web(event: impl Into<ChangeEvent>, current: Option<Value>, pinned: Option<Value>) -> Option<Value> {
        get_value(&event.into(), current.as_ref(), pinned.as_ref(), Platform::Web)
    }

    #[test]
    fn test_raw_value_passes_through() {
        assert_eq!(web(json!(42), None, None), Some(json!(42)));
        assert_eq!(web(ChangeEvent::Value(None), None, None), None);
    }

    #[test]
    fn test_native_text_wins_on_every_platform() {
        let event = ChangeEvent::from(InputEvent::native("hello"));
        for platform in [Platform::Web, Platform::Native] {
            assert_eq!(get_value(&event, None, None, platform), Some(json!("hello")));
        }
        let empty = ChangeEvent::from(InputEvent::default());
        assert_eq!(get_value(&empty, None, None, Platform::Native), None);
    }

    #[test]
    fn test_checkbox_without_pinned_value_is_boolean() {
        assert_eq!(web(EventTarget::checkbox(true), None, None), Some(json!(true)));
        assert_eq!(web(EventTarget::checkbox(false), None, None), Some(json!(false)));
    }

    #[test]
    fn test_checkbox_group_add_and_remove() {
        let current = Some(json!(["A", "B"]));
        assert_eq!(
            web(EventTarget::checkbox(false), current.clone(), Some(json!("B"))),
            Some(json!(["A"]))
        );
        assert_eq!(
            web(EventTarget::checkbox(true), current.clone(), Some(json!("C"))),
            Some(json!(["A", "B", "C"]))
        );
        // already present / already absent
        assert_eq!(
            web(EventTarget::checkbox(true), current.clone(), Some(json!("A"))),
            current
        );
        assert_eq!(
            web(EventTarget::checkbox(false), current.clone(), Some(json!("Z"))),
            current
        );
    }

    #[test]
    fn test_checkbox_group_without_array() {
        assert_eq!(
            web(EventTarget::checkbox(true), None, Some(json!("A"))),
            Some(json!(["A"]))
        );
        assert_eq!(
            web(EventTarget::checkbox(true), Some(json!("x")), Some(json!("A"))),
            Some(json!(["A"]))
        );
        assert_eq!(
            web(EventTarget::checkbox(false), Some(json!("x")), Some(json!("A"))),
            Some(json!("x"))
        );
    }

    #[test]
    fn test_select_multiple() {
        let options = vec![
            SelectOption { value: json!("a"), selected: true },
            SelectOption { value: json!("b"), selected: false },
            SelectOption { value: json!("c"), selected: true },
        ];
        assert_eq!(
            web(EventTarget::select_multiple(options), None, None),
            Some(json!(["a", "c"]))
        );
        assert_eq!(
            web(EventTarget::select_multiple(vec![]), None, None),
            Some(json!([]))
        );
    }

    #[test]
    fn test_other_controls_keep_native_type() {
        assert_eq!(web(EventTarget::text("abc"), None, None), Some(json!("abc")));
        assert_eq!(
            web(EventTarget::new("number").with_value(7), None, None),
            Some(json!(7))
        );
        assert_eq!(
            web(EventTarget::new("radio").with_value(true), None, None),
            Some(json!(true))
        );
    }

    #[test]
    fn test_default_parse_and_format() {
        assert_eq!(default_parse(Some(json!("")), "x"), None);
        assert_eq!(default_parse(Some(json!("a")), "x"), Some(json!("a")));
        assert_eq!(default_parse(Some(json!(0)), "x"), Some(json!(0)));
        assert_eq!(default_format(None, "x"), Some(json!("")));
        assert_eq!(default_format(Some(&json!(null)), "x"), Some(json!(null)));
        assert_eq!(default_parse(default_format(None, "x"), "x"), None);
    }

    #[test]
    fn test_unpack_warning() {
        let target = EventTarget::checkbox(true);
        let message = unpack_warning(&target, None, "toppings", Some(&json!(["a", "b"])))
            .expect("ambiguous checkbox should warn");
        assert!(message.contains("type=\"checkbox\""));
        assert!(message.contains("Field(toppings)"));
        assert!(message.contains("[a,b]"));

        let select = EventTarget::select_multiple(vec![]);
        let message = unpack_warning(&select, None, "colors", None).expect("warns");
        assert!(message.contains("type=\"select\""));

        assert!(unpack_warning(&target, Some(&ControlType::Checkbox), "t", None).is_none());
        assert!(unpack_warning(&EventTarget::text("x"), None, "t", None).is_none());
    }
}
