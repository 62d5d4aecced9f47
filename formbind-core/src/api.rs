//! Capability contract of the form-state engine
//!
//! The engine (field registry, validation, submission lifecycle) lives
//! outside this crate. Bindings only ever talk to it through [`FormApi`];
//! they never reach into engine storage. [`crate::testing::MemoryForm`] is an
//! in-memory implementation used by the tests.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::impl_shallow_eq;
use crate::path::Values;
pub use crate::subscription::{FieldSubscription, FormSubscription};

/// Shared handle to an engine instance.
pub type FormHandle = Rc<dyn FormApi>;

/// Receives field state whenever a subscribed attribute changes.
pub type FieldListener = Rc<dyn Fn(FieldState)>;

/// Receives form state whenever a subscribed attribute changes.
pub type FormListener = Rc<dyn Fn(FormState)>;

/// Field-level validator: `(value, all values) -> error`.
pub type FieldValidator = Rc<dyn Fn(Option<&Value>, &Values) -> Option<Value>>;

/// Reads the field's current validator at validation time.
pub type ValidatorGetter = Rc<dyn Fn() -> Option<FieldValidator>>;

/// Record-level validator returning errors keyed like the values.
pub type RecordValidator = Rc<dyn Fn(&Values) -> Values>;

/// Submission handler; returned values are submission errors.
pub type SubmitHandler = Rc<dyn Fn(&Values, &dyn FormApi) -> Option<Values>>;

/// Runs before submission; returning `false` cancels it.
pub type BeforeSubmit = Rc<dyn Fn() -> bool>;

/// Runs after a successful submission.
pub type AfterSubmit = Rc<dyn Fn()>;

/// Value equality used for dirty tracking.
pub type IsEqual = Rc<dyn Fn(Option<&Value>, Option<&Value>) -> bool>;

/// Named state transformation invoked through [`FormApi::mutate`].
pub type Mutator = Rc<dyn Fn(&[Value], &mut Values)>;

/// Named mutators, keyed by the name they are invoked with.
pub type Mutators = BTreeMap<String, Mutator>;

/// Called with the form state after every engine update.
pub type DebugHook = Rc<dyn Fn(&FormState)>;

/// Cancels a registration, subscription or attached decorator.
///
/// Calling it more than once is harmless, and dropping it cancels whatever
/// has not been cancelled yet.
#[must_use = "dropping an Unsubscribe cancels it immediately"]
pub struct Unsubscribe(Option<Box<dyn FnOnce()>>);

impl Unsubscribe {
    /// Wrap the cancellation to run once.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Cancel now. Later calls do nothing.
    pub fn call(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }

    /// Whether the cancellation already ran.
    pub fn is_spent(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("spent", &self.is_spent())
            .finish()
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.call();
    }
}

/// Per-field options supplied at registration.
#[derive(Clone, Default)]
pub struct FieldConfig {
    pub after_submit: Option<AfterSubmit>,
    pub before_submit: Option<BeforeSubmit>,
    pub data: Values,
    pub default_value: Option<Value>,
    pub get_validator: Option<ValidatorGetter>,
    pub initial_value: Option<Value>,
    pub is_equal: Option<IsEqual>,
    /// Skip the immediate notification and validation on registration.
    pub silent: bool,
    /// Fields to validate when this one changes; `None` validates all.
    pub validate_fields: Option<Vec<String>>,
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("data", &self.data)
            .field("default_value", &self.default_value)
            .field("initial_value", &self.initial_value)
            .field("has_validator", &self.get_validator.is_some())
            .field("silent", &self.silent)
            .field("validate_fields", &self.validate_fields)
            .finish_non_exhaustive()
    }
}

/// Options used to create an engine instance.
#[derive(Clone, Default)]
pub struct FormConfig {
    pub debug: Option<DebugHook>,
    pub destroy_on_unregister: bool,
    pub initial_values: Option<Values>,
    pub keep_dirty_on_reinitialize: bool,
    pub mutators: Mutators,
    pub on_submit: Option<SubmitHandler>,
    pub validate: Option<RecordValidator>,
    pub validate_on_blur: bool,
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("destroy_on_unregister", &self.destroy_on_unregister)
            .field("initial_values", &self.initial_values)
            .field("keep_dirty_on_reinitialize", &self.keep_dirty_on_reinitialize)
            .field("mutators", &self.mutators.keys().collect::<Vec<_>>())
            .field("has_on_submit", &self.on_submit.is_some())
            .field("has_validate", &self.validate.is_some())
            .field("validate_on_blur", &self.validate_on_blur)
            .finish_non_exhaustive()
    }
}

/// A live configuration change pushed into a running engine.
#[derive(Clone)]
pub enum ConfigUpdate {
    Debug(Option<DebugHook>),
    DestroyOnUnregister(bool),
    InitialValues(Values),
    KeepDirtyOnReinitialize(bool),
    Mutators(Mutators),
    OnSubmit(SubmitHandler),
    Validate(Option<RecordValidator>),
    ValidateOnBlur(bool),
}

impl ConfigUpdate {
    /// Configuration key this update targets.
    pub fn key(&self) -> &'static str {
        match self {
            ConfigUpdate::Debug(_) => "debug",
            ConfigUpdate::DestroyOnUnregister(_) => "destroyOnUnregister",
            ConfigUpdate::InitialValues(_) => "initialValues",
            ConfigUpdate::KeepDirtyOnReinitialize(_) => "keepDirtyOnReinitialize",
            ConfigUpdate::Mutators(_) => "mutators",
            ConfigUpdate::OnSubmit(_) => "onSubmit",
            ConfigUpdate::Validate(_) => "validate",
            ConfigUpdate::ValidateOnBlur(_) => "validateOnBlur",
        }
    }
}

impl fmt::Debug for ConfigUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigUpdate").field(&self.key()).finish()
    }
}

/// What a submit attempt produced, passed through untouched by bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Blocked by validation errors, a `before_submit` hook, or an
    /// in-flight submission.
    Skipped,
    Completed { errors: Option<Values> },
}

/// State of a single field as published by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub name: String,
    pub active: bool,
    pub data: Values,
    pub dirty: bool,
    pub dirty_since_last_submit: bool,
    pub error: Option<Value>,
    pub initial: Option<Value>,
    pub invalid: bool,
    pub length: Option<usize>,
    pub modified: bool,
    pub modified_since_last_submit: bool,
    pub pristine: bool,
    pub submit_error: Option<Value>,
    pub submit_failed: bool,
    pub submit_succeeded: bool,
    pub submitting: bool,
    pub touched: bool,
    pub valid: bool,
    pub validating: bool,
    pub value: Option<Value>,
    pub visited: bool,
}

impl_shallow_eq!(FieldState {
    name,
    active,
    data,
    dirty,
    dirty_since_last_submit,
    error,
    initial,
    invalid,
    length,
    modified,
    modified_since_last_submit,
    pristine,
    submit_error,
    submit_failed,
    submit_succeeded,
    submitting,
    touched,
    valid,
    validating,
    value,
    visited,
});

impl FieldState {
    /// Keep only the subscribed attributes; the rest fall back to defaults.
    ///
    /// `name` is always kept.
    pub fn filtered(&self, subscription: FieldSubscription) -> FieldState {
        macro_rules! pick {
            ($flag:ident, $field:ident) => {
                if subscription.contains(FieldSubscription::$flag) {
                    self.$field.clone()
                } else {
                    Default::default()
                }
            };
        }
        FieldState {
            name: self.name.clone(),
            active: pick!(ACTIVE, active),
            data: pick!(DATA, data),
            dirty: pick!(DIRTY, dirty),
            dirty_since_last_submit: pick!(DIRTY_SINCE_LAST_SUBMIT, dirty_since_last_submit),
            error: pick!(ERROR, error),
            initial: pick!(INITIAL, initial),
            invalid: pick!(INVALID, invalid),
            length: pick!(LENGTH, length),
            modified: pick!(MODIFIED, modified),
            modified_since_last_submit: pick!(
                MODIFIED_SINCE_LAST_SUBMIT,
                modified_since_last_submit
            ),
            pristine: pick!(PRISTINE, pristine),
            submit_error: pick!(SUBMIT_ERROR, submit_error),
            submit_failed: pick!(SUBMIT_FAILED, submit_failed),
            submit_succeeded: pick!(SUBMIT_SUCCEEDED, submit_succeeded),
            submitting: pick!(SUBMITTING, submitting),
            touched: pick!(TOUCHED, touched),
            valid: pick!(VALID, valid),
            validating: pick!(VALIDATING, validating),
            value: pick!(VALUE, value),
            visited: pick!(VISITED, visited),
        }
    }
}

/// State of the whole form as published by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    pub active: Option<String>,
    pub dirty: bool,
    pub dirty_fields: BTreeMap<String, bool>,
    pub dirty_fields_since_last_submit: BTreeMap<String, bool>,
    pub dirty_since_last_submit: bool,
    pub error: Option<Value>,
    pub errors: Values,
    pub has_submit_errors: bool,
    pub has_validation_errors: bool,
    pub initial_values: Values,
    pub invalid: bool,
    pub modified: BTreeMap<String, bool>,
    pub modified_since_last_submit: bool,
    pub pristine: bool,
    pub submit_error: Option<Value>,
    pub submit_errors: Option<Values>,
    pub submit_failed: bool,
    pub submit_succeeded: bool,
    pub submitting: bool,
    pub touched: BTreeMap<String, bool>,
    pub valid: bool,
    pub validating: bool,
    pub values: Values,
    pub visited: BTreeMap<String, bool>,
}

impl_shallow_eq!(FormState {
    active,
    dirty,
    dirty_fields,
    dirty_fields_since_last_submit,
    dirty_since_last_submit,
    error,
    errors,
    has_submit_errors,
    has_validation_errors,
    initial_values,
    invalid,
    modified,
    modified_since_last_submit,
    pristine,
    submit_error,
    submit_errors,
    submit_failed,
    submit_succeeded,
    submitting,
    touched,
    valid,
    validating,
    values,
    visited,
});

impl FormState {
    /// Keep only the subscribed attributes; the rest fall back to defaults.
    pub fn filtered(&self, subscription: FormSubscription) -> FormState {
        macro_rules! pick {
            ($flag:ident, $field:ident) => {
                if subscription.contains(FormSubscription::$flag) {
                    self.$field.clone()
                } else {
                    Default::default()
                }
            };
        }
        FormState {
            active: pick!(ACTIVE, active),
            dirty: pick!(DIRTY, dirty),
            dirty_fields: pick!(DIRTY_FIELDS, dirty_fields),
            dirty_fields_since_last_submit: pick!(
                DIRTY_FIELDS_SINCE_LAST_SUBMIT,
                dirty_fields_since_last_submit
            ),
            dirty_since_last_submit: pick!(DIRTY_SINCE_LAST_SUBMIT, dirty_since_last_submit),
            error: pick!(ERROR, error),
            errors: pick!(ERRORS, errors),
            has_submit_errors: pick!(HAS_SUBMIT_ERRORS, has_submit_errors),
            has_validation_errors: pick!(HAS_VALIDATION_ERRORS, has_validation_errors),
            initial_values: pick!(INITIAL_VALUES, initial_values),
            invalid: pick!(INVALID, invalid),
            modified: pick!(MODIFIED, modified),
            modified_since_last_submit: pick!(
                MODIFIED_SINCE_LAST_SUBMIT,
                modified_since_last_submit
            ),
            pristine: pick!(PRISTINE, pristine),
            submit_error: pick!(SUBMIT_ERROR, submit_error),
            submit_errors: pick!(SUBMIT_ERRORS, submit_errors),
            submit_failed: pick!(SUBMIT_FAILED, submit_failed),
            submit_succeeded: pick!(SUBMIT_SUCCEEDED, submit_succeeded),
            submitting: pick!(SUBMITTING, submitting),
            touched: pick!(TOUCHED, touched),
            valid: pick!(VALID, valid),
            validating: pick!(VALIDATING, validating),
            values: pick!(VALUES, values),
            visited: pick!(VISITED, visited),
        }
    }
}

/// The engine capability set the bindings rely on.
///
/// All methods take `&self`: an engine is shared by every binding of one
/// form and keeps its own state behind interior mutability. Implementations
/// must not hold internal borrows while invoking listeners, since listeners
/// are free to call back into the engine.
pub trait FormApi {
    /// Register a field listener. The listener is called immediately with the
    /// current state unless `config.silent` is set.
    fn register_field(
        &self,
        name: &str,
        listener: FieldListener,
        subscription: FieldSubscription,
        config: FieldConfig,
    ) -> Unsubscribe;

    /// Subscribe to form state. The listener is called immediately.
    fn subscribe(&self, listener: FormListener, subscription: FormSubscription) -> Unsubscribe;

    fn get_state(&self) -> FormState;

    /// State of a registered field, `None` when no binding holds it.
    fn get_field_state(&self, name: &str) -> Option<FieldState>;

    fn change(&self, name: &str, value: Option<Value>);

    fn blur(&self, name: &str);

    fn focus(&self, name: &str);

    /// Run `f` with notifications deferred until it returns.
    fn batch(&self, f: &mut dyn FnMut());

    fn submit(&self) -> Submission;

    /// Reset to `values`, or to the current initial values.
    fn reset(&self, values: Option<Values>);

    fn initialize(&self, values: Values);

    fn set_config(&self, update: ConfigUpdate);

    fn pause_validation(&self);

    fn resume_validation(&self);

    fn is_validation_paused(&self) -> bool;

    /// Whether unregistering the last listener of a field purges its value.
    fn destroy_on_unregister(&self) -> bool;

    fn set_destroy_on_unregister(&self, destroy: bool);

    /// Invoke a configured mutator. Returns `false` when none is named so.
    fn mutate(&self, mutator: &str, args: &[Value]) -> bool;

    /// Names of currently registered fields.
    fn field_names(&self) -> Vec<String>;
}

/// An engine that can be created from configuration.
pub trait FormEngine: FormApi + Sized + 'static {
    fn create(config: FormConfig) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shallow::shallow_equal;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_unsubscribe_runs_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut unsubscribe = Unsubscribe::new(move || counter.set(counter.get() + 1));
        assert!(!unsubscribe.is_spent());
        unsubscribe.call();
        unsubscribe.call();
        assert!(unsubscribe.is_spent());
        drop(unsubscribe);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        drop(Unsubscribe::new(move || counter.set(counter.get() + 1)));
        assert_eq!(calls.get(), 1);
        let mut noop = Unsubscribe::noop();
        noop.call();
    }

    #[test]
    fn test_field_state_filtered_keeps_subscribed_keys() {
        let state = FieldState {
            name: "email".into(),
            active: true,
            value: Some(json!("a@b.c")),
            pristine: true,
            ..FieldState::default()
        };
        let filtered = state.filtered(FieldSubscription::VALUE);
        assert_eq!(filtered.name, "email");
        assert_eq!(filtered.value, Some(json!("a@b.c")));
        assert!(!filtered.active);
        assert!(!filtered.pristine);

        let mut focused = state.clone();
        focused.active = false;
        assert!(shallow_equal(
            Some(&state.filtered(FieldSubscription::VALUE)),
            Some(&focused.filtered(FieldSubscription::VALUE)),
        ));
        assert!(!shallow_equal(Some(&state), Some(&focused)));
    }

    #[test]
    fn test_form_state_filtered() {
        let state = FormState {
            submitting: true,
            pristine: true,
            ..FormState::default()
        };
        let filtered = state.filtered(FormSubscription::SUBMITTING);
        assert!(filtered.submitting);
        assert!(!filtered.pristine);
    }
}
