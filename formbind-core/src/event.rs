//! Change occurrences delivered by UI controls

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which input runtime is hosting the bindings.
///
/// Provided through the context [`Scope`](crate::context::Scope); defaults to
/// [`Platform::Web`] when nothing is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    Web,
    /// Mobile runtime whose change events carry a native text payload.
    Native,
}

/// Control kind as reported by an event target or declared on a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlType {
    Checkbox,
    Radio,
    SelectMultiple,
    Other(String),
}

impl ControlType {
    /// Control name in the vocabulary of native form controls.
    pub fn as_str(&self) -> &str {
        match self {
            ControlType::Checkbox => "checkbox",
            ControlType::Radio => "radio",
            ControlType::SelectMultiple => "select-multiple",
            ControlType::Other(other) => other,
        }
    }
}

impl From<&str> for ControlType {
    fn from(s: &str) -> Self {
        match s {
            "checkbox" => ControlType::Checkbox,
            "radio" => ControlType::Radio,
            "select-multiple" => ControlType::SelectMultiple,
            other => ControlType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One option of a multi-select control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    pub selected: bool,
}

/// The control that produced an input event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTarget {
    pub control: ControlType,
    pub value: Option<Value>,
    pub checked: bool,
    pub options: Vec<SelectOption>,
}

impl EventTarget {
    /// A target of the given control type with no value, unchecked.
    pub fn new(control: impl Into<ControlType>) -> Self {
        Self {
            control: control.into(),
            value: None,
            checked: false,
            options: Vec::new(),
        }
    }

    /// Plain text control reporting `value`.
    pub fn text(value: impl Into<Value>) -> Self {
        Self::new("text").with_value(value)
    }

    /// Checkbox control, optionally carrying its own value attribute.
    pub fn checkbox(checked: bool) -> Self {
        Self {
            checked,
            ..Self::new(ControlType::Checkbox)
        }
    }

    /// Multi-select control with the given options.
    pub fn select_multiple(options: Vec<SelectOption>) -> Self {
        Self {
            options,
            ..Self::new(ControlType::SelectMultiple)
        }
    }

    /// Set the value the control reports.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// An input event from a UI control.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputEvent {
    /// Text payload carried by mobile input runtimes.
    pub native_text: Option<String>,
    pub target: Option<EventTarget>,
}

impl InputEvent {
    /// An event carrying a control target.
    pub fn target(target: EventTarget) -> Self {
        Self {
            native_text: None,
            target: Some(target),
        }
    }

    /// An event from a mobile runtime that reports text directly.
    pub fn native(text: impl Into<String>) -> Self {
        Self {
            native_text: Some(text.into()),
            target: None,
        }
    }
}

/// What a change handler receives.
///
/// Controls either report an [`InputEvent`] that still has to be unpacked,
/// or hand over the logical value directly.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Value(Option<Value>),
    Input(InputEvent),
}

impl ChangeEvent {
    /// The control target, if the change came from one.
    pub fn target(&self) -> Option<&EventTarget> {
        match self {
            ChangeEvent::Input(event) => event.target.as_ref(),
            ChangeEvent::Value(_) => None,
        }
    }
}

impl From<InputEvent> for ChangeEvent {
    fn from(event: InputEvent) -> Self {
        ChangeEvent::Input(event)
    }
}

impl From<EventTarget> for ChangeEvent {
    fn from(target: EventTarget) -> Self {
        ChangeEvent::Input(InputEvent::target(target))
    }
}

impl From<Value> for ChangeEvent {
    fn from(value: Value) -> Self {
        ChangeEvent::Value(Some(value))
    }
}

impl From<Option<Value>> for ChangeEvent {
    fn from(value: Option<Value>) -> Self {
        ChangeEvent::Value(value)
    }
}

impl From<&str> for ChangeEvent {
    fn from(value: &str) -> Self {
        ChangeEvent::Value(Some(Value::from(value)))
    }
}

/// A submit or reset occurrence from a UI runtime.
///
/// Runtimes differ in what they support; a missing capability is simply
/// skipped. An occurrence counts as a UI event when it can stop propagation.
#[derive(Clone, Default)]
pub struct UiEvent {
    prevent_default: Option<Rc<dyn Fn()>>,
    stop_propagation: Option<Rc<dyn Fn()>>,
}

impl fmt::Debug for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiEvent")
            .field("prevent_default", &self.prevent_default.is_some())
            .field("stop_propagation", &self.stop_propagation.is_some())
            .finish()
    }
}

impl UiEvent {
    /// An occurrence with no capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the occurrence a prevent-default capability.
    pub fn on_prevent_default(mut self, f: impl Fn() + 'static) -> Self {
        self.prevent_default = Some(Rc::new(f));
        self
    }

    /// Give the occurrence a stop-propagation capability.
    pub fn on_stop_propagation(mut self, f: impl Fn() + 'static) -> Self {
        self.stop_propagation = Some(Rc::new(f));
        self
    }

    /// Invoke the prevent-default capability, if any.
    pub fn prevent_default(&self) {
        if let Some(f) = &self.prevent_default {
            f();
        }
    }

    /// Invoke the stop-propagation capability, if any.
    pub fn stop_propagation(&self) {
        if let Some(f) = &self.stop_propagation {
            f();
        }
    }

    /// Whether this occurrence has the shape of a UI event.
    pub fn is_ui_event(&self) -> bool {
        self.stop_propagation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_control_type_names() {
        assert_eq!(ControlType::from("checkbox"), ControlType::Checkbox);
        assert_eq!(ControlType::from("select-multiple").as_str(), "select-multiple");
        assert_eq!(
            ControlType::from("email"),
            ControlType::Other("email".to_string())
        );
    }

    #[test]
    fn test_ui_event_missing_capabilities_are_skipped() {
        let bare = UiEvent::new();
        bare.prevent_default();
        bare.stop_propagation();
        assert!(!bare.is_ui_event());

        let stopped = Rc::new(Cell::new(false));
        let flag = stopped.clone();
        let event = UiEvent::new().on_stop_propagation(move || flag.set(true));
        assert!(event.is_ui_event());
        event.stop_propagation();
        assert!(stopped.get());
    }
}
