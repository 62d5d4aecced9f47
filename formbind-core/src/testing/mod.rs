//! Test utilities for formbind bindings
//!
//! - [`MemoryForm`]: in-memory engine implementing [`FormApi`]
//! - [`RecordingForm`]: wraps an engine and records every call made to it
//! - [`RenderCount`]: counts renderer invocations
//! - [`values`]: build a [`Values`] map from a JSON literal
//! - Assertion macros for inspecting recorded engine calls
//!
//! # Example
//!
//! ```ignore
//! use formbind::testing::{EngineCall, MemoryForm, RecordingForm};
//!
//! let form = RecordingForm::new(MemoryForm::new(FormConfig::default()));
//! form.change("name", Some(json!("erik")));
//! assert_called!(form.calls(), EngineCall::Change(name, _) if name == "name");
//! ```

mod engine;

pub use engine::{MemoryForm, FORM_ERROR};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::api::{
    ConfigUpdate, FieldConfig, FieldListener, FieldState, FieldSubscription, FormApi,
    FormListener, FormState, FormSubscription, Submission, Unsubscribe,
};
use crate::path::Values;

/// Build a [`Values`] map from a JSON object literal.
///
/// # Panics
///
/// Panics when `value` is not an object.
pub fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Counts how often a renderer ran.
#[derive(Debug, Clone, Default)]
pub struct RenderCount(Rc<Cell<usize>>);

impl RenderCount {
    /// A counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one render.
    pub fn tick(&self) {
        self.0.set(self.0.get() + 1);
    }

    /// Renders counted so far.
    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// One call observed by a [`RecordingForm`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Register(String),
    Unregister(String),
    Subscribe,
    Unsubscribe,
    Change(String, Option<Value>),
    Blur(String),
    Focus(String),
    Batch,
    Submit,
    Reset(Option<Values>),
    Initialize(Values),
    SetConfig(&'static str),
    PauseValidation,
    ResumeValidation,
    SetDestroyOnUnregister(bool),
    Mutate(String),
}

/// Assert that a recorded engine call matches a pattern.
///
/// # Example
///
/// ```ignore
/// assert_called!(form.calls(), EngineCall::Submit);
/// ```
#[macro_export]
macro_rules! assert_called {
    ($calls:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $calls.iter().any(|c| matches!(c, $pattern $(if $guard)?)),
            "Expected engine call matching `{}`, but got: {:?}",
            stringify!($pattern),
            $calls
        );
    };
}

/// Assert that no recorded engine call matches a pattern.
#[macro_export]
macro_rules! assert_not_called {
    ($calls:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$calls.iter().any(|c| matches!(c, $pattern $(if $guard)?)),
            "Expected NO engine call matching `{}`, but got: {:?}",
            stringify!($pattern),
            $calls
        );
    };
}

/// Count recorded engine calls matching a pattern.
#[macro_export]
macro_rules! count_called {
    ($calls:expr, $pattern:pat $(if $guard:expr)?) => {
        $calls.iter().filter(|c| matches!(c, $pattern $(if $guard)?)).count()
    };
}

/// Engine wrapper recording every mutating call.
///
/// Reads (`get_state`, `get_field_state`, ...) are passed through without
/// being recorded.
pub struct RecordingForm {
    inner: Rc<dyn FormApi>,
    calls: Rc<RefCell<Vec<EngineCall>>>,
}

impl std::fmt::Debug for RecordingForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingForm")
            .field("calls", &self.calls.borrow().len())
            .finish_non_exhaustive()
    }
}

impl RecordingForm {
    /// Record every call before forwarding it to `inner`.
    pub fn new(inner: impl FormApi + 'static) -> Self {
        Self {
            inner: Rc::new(inner),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn record(&self, call: EngineCall) {
        self.calls.borrow_mut().push(call);
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    /// Return and forget the recorded calls.
    pub fn drain_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// How many times `name` was registered.
    pub fn register_count(&self, name: &str) -> usize {
        count_called!(self.calls(), EngineCall::Register(n) if n == name)
    }

    /// How many times a registration of `name` was cancelled.
    pub fn unregister_count(&self, name: &str) -> usize {
        count_called!(self.calls(), EngineCall::Unregister(n) if n == name)
    }
}

impl FormApi for RecordingForm {
    fn register_field(
        &self,
        name: &str,
        listener: FieldListener,
        subscription: FieldSubscription,
        config: FieldConfig,
    ) -> Unsubscribe {
        self.record(EngineCall::Register(name.to_string()));
        let mut unregister = self.inner.register_field(name, listener, subscription, config);
        let calls = Rc::clone(&self.calls);
        let name = name.to_string();
        Unsubscribe::new(move || {
            calls.borrow_mut().push(EngineCall::Unregister(name));
            unregister.call();
        })
    }

    fn subscribe(&self, listener: FormListener, subscription: FormSubscription) -> Unsubscribe {
        self.record(EngineCall::Subscribe);
        let mut unsubscribe = self.inner.subscribe(listener, subscription);
        let calls = Rc::clone(&self.calls);
        Unsubscribe::new(move || {
            calls.borrow_mut().push(EngineCall::Unsubscribe);
            unsubscribe.call();
        })
    }

    fn get_state(&self) -> FormState {
        self.inner.get_state()
    }

    fn get_field_state(&self, name: &str) -> Option<FieldState> {
        self.inner.get_field_state(name)
    }

    fn change(&self, name: &str, value: Option<Value>) {
        self.record(EngineCall::Change(name.to_string(), value.clone()));
        self.inner.change(name, value);
    }

    fn blur(&self, name: &str) {
        self.record(EngineCall::Blur(name.to_string()));
        self.inner.blur(name);
    }

    fn focus(&self, name: &str) {
        self.record(EngineCall::Focus(name.to_string()));
        self.inner.focus(name);
    }

    fn batch(&self, f: &mut dyn FnMut()) {
        self.record(EngineCall::Batch);
        self.inner.batch(f);
    }

    fn submit(&self) -> Submission {
        self.record(EngineCall::Submit);
        self.inner.submit()
    }

    fn reset(&self, values: Option<Values>) {
        self.record(EngineCall::Reset(values.clone()));
        self.inner.reset(values);
    }

    fn initialize(&self, values: Values) {
        self.record(EngineCall::Initialize(values.clone()));
        self.inner.initialize(values);
    }

    fn set_config(&self, update: ConfigUpdate) {
        self.record(EngineCall::SetConfig(update.key()));
        self.inner.set_config(update);
    }

    fn pause_validation(&self) {
        self.record(EngineCall::PauseValidation);
        self.inner.pause_validation();
    }

    fn resume_validation(&self) {
        self.record(EngineCall::ResumeValidation);
        self.inner.resume_validation();
    }

    fn is_validation_paused(&self) -> bool {
        self.inner.is_validation_paused()
    }

    fn destroy_on_unregister(&self) -> bool {
        self.inner.destroy_on_unregister()
    }

    fn set_destroy_on_unregister(&self, destroy: bool) {
        self.record(EngineCall::SetDestroyOnUnregister(destroy));
        self.inner.set_destroy_on_unregister(destroy);
    }

    fn mutate(&self, mutator: &str, args: &[Value]) -> bool {
        self.record(EngineCall::Mutate(mutator.to_string()));
        self.inner.mutate(mutator, args)
    }

    fn field_names(&self) -> Vec<String> {
        self.inner.field_names()
    }
}
