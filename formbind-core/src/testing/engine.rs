//! In-memory form-state engine
//!
//! A compact implementation of the [`FormApi`] contract, enough to drive
//! the bindings end to end in tests and demos: field registry with
//! per-subscriber change gating, record and field validation with
//! pause/resume, blur-time validation, submission hooks, reset and
//! reinitialisation, batching, mutators and a debug hook.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::api::{
    AfterSubmit, BeforeSubmit, ConfigUpdate, DebugHook, FieldConfig, FieldListener,
    FieldState, FieldSubscription, FormApi, FormConfig, FormEngine, FormListener, FormState,
    FormSubscription, IsEqual, RecordValidator, Submission, SubmitHandler, Unsubscribe,
    ValidatorGetter,
};
use crate::path::{get_in, set_in, Values};
use crate::shallow::shallow_equal;

/// Key under which record validators and submit handlers report errors that
/// belong to the form rather than a field.
pub const FORM_ERROR: &str = "FINAL_FORM/form-error";

struct FieldSubscriber {
    listener: FieldListener,
    subscription: FieldSubscription,
    last: Option<FieldState>,
    get_validator: Option<ValidatorGetter>,
    before_submit: Option<BeforeSubmit>,
    after_submit: Option<AfterSubmit>,
}

struct FieldEntry {
    subscribers: BTreeMap<u64, FieldSubscriber>,
    data: Values,
    is_equal: Option<IsEqual>,
    validate_fields: Option<Vec<String>>,
    modified: bool,
    modified_since_last_submit: bool,
    touched: bool,
    visited: bool,
}

impl FieldEntry {
    fn new() -> Self {
        Self {
            subscribers: BTreeMap::new(),
            data: Values::new(),
            is_equal: None,
            validate_fields: None,
            modified: false,
            modified_since_last_submit: false,
            touched: false,
            visited: false,
        }
    }

    fn values_equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        match &self.is_equal {
            Some(is_equal) => is_equal(a, b),
            None => a == b,
        }
    }

    fn validators(&self) -> Vec<crate::api::FieldValidator> {
        self.subscribers
            .values()
            .filter_map(|s| s.get_validator.as_ref().and_then(|get| get()))
            .collect()
    }
}

struct FormSubscriber {
    listener: FormListener,
    subscription: FormSubscription,
    last: Option<FormState>,
}

struct Inner {
    config: FormConfig,
    values: Values,
    initial_values: Values,
    last_submitted_values: Option<Values>,
    fields: BTreeMap<String, FieldEntry>,
    form_subscribers: BTreeMap<u64, FormSubscriber>,
    next_id: u64,
    active: Option<String>,
    record_errors: Values,
    field_errors: BTreeMap<String, Value>,
    errors: Values,
    submit_errors: Option<Values>,
    submitting: bool,
    submit_failed: bool,
    submit_succeeded: bool,
    validation_paused: bool,
    validation_blocked: bool,
    batch_depth: u32,
    notifying: bool,
    notify_pending: bool,
}

enum Delivery {
    Field(FieldListener, String, u64, FieldState),
    Form(FormListener, u64, FormState),
}

/// Inputs of one validation pass, captured so validators run unborrowed.
struct ValidationPlan {
    values: Values,
    record: Option<RecordValidator>,
    fields: Vec<(String, Vec<crate::api::FieldValidator>)>,
}

impl Inner {
    fn new(config: FormConfig) -> Self {
        let initial_values = config.initial_values.clone().unwrap_or_default();
        Self {
            values: initial_values.clone(),
            initial_values,
            config,
            last_submitted_values: None,
            fields: BTreeMap::new(),
            form_subscribers: BTreeMap::new(),
            next_id: 0,
            active: None,
            record_errors: Values::new(),
            field_errors: BTreeMap::new(),
            errors: Values::new(),
            submit_errors: None,
            submitting: false,
            submit_failed: false,
            submit_succeeded: false,
            validation_paused: false,
            validation_blocked: false,
            batch_depth: 0,
            notifying: false,
            notify_pending: false,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn field_state(&self, name: &str) -> Option<FieldState> {
        let entry = self.fields.get(name)?;
        let value = get_in(&self.values, name).cloned();
        let initial = get_in(&self.initial_values, name).cloned();
        let dirty = !entry.values_equal(initial.as_ref(), value.as_ref());
        let dirty_since_last_submit = self.last_submitted_values.as_ref().is_some_and(|last| {
            !entry.values_equal(get_in(last, name), value.as_ref())
        });
        let error = get_in(&self.errors, name).cloned();
        let submit_error = self
            .submit_errors
            .as_ref()
            .and_then(|errors| get_in(errors, name))
            .cloned();
        let invalid = error.is_some() || submit_error.is_some();
        Some(FieldState {
            name: name.to_string(),
            active: self.active.as_deref() == Some(name),
            data: entry.data.clone(),
            dirty,
            dirty_since_last_submit,
            error,
            initial,
            invalid,
            length: value.as_ref().and_then(Value::as_array).map(Vec::len),
            modified: entry.modified,
            modified_since_last_submit: entry.modified_since_last_submit,
            pristine: !dirty,
            submit_error,
            submit_failed: self.submit_failed,
            submit_succeeded: self.submit_succeeded,
            submitting: self.submitting,
            touched: entry.touched,
            valid: !invalid,
            validating: false,
            value,
            visited: entry.visited,
        })
    }

    fn form_state(&self) -> FormState {
        let mut state = FormState {
            active: self.active.clone(),
            errors: self.errors.clone(),
            error: self.errors.get(FORM_ERROR).cloned(),
            initial_values: self.initial_values.clone(),
            submit_errors: self.submit_errors.clone(),
            submit_error: self
                .submit_errors
                .as_ref()
                .and_then(|errors| errors.get(FORM_ERROR))
                .cloned(),
            submit_failed: self.submit_failed,
            submit_succeeded: self.submit_succeeded,
            submitting: self.submitting,
            values: self.values.clone(),
            ..FormState::default()
        };
        for name in self.fields.keys() {
            let Some(field) = self.field_state(name) else {
                continue;
            };
            if field.dirty {
                state.dirty_fields.insert(name.clone(), true);
            }
            if field.dirty_since_last_submit {
                state.dirty_fields_since_last_submit.insert(name.clone(), true);
            }
            state.modified.insert(name.clone(), field.modified);
            state.touched.insert(name.clone(), field.touched);
            state.visited.insert(name.clone(), field.visited);
            state.modified_since_last_submit |= field.modified_since_last_submit;
        }
        state.dirty = !state.dirty_fields.is_empty();
        state.pristine = !state.dirty;
        state.dirty_since_last_submit = !state.dirty_fields_since_last_submit.is_empty();
        state.has_validation_errors = !state.errors.is_empty();
        state.has_submit_errors = state.submit_errors.as_ref().is_some_and(|e| !e.is_empty());
        state.invalid = state.has_validation_errors
            || (state.has_submit_errors && !state.dirty_since_last_submit);
        state.valid = !state.invalid;
        state
    }

    /// Work out which listeners see a change, recording what they were sent.
    fn collect_deliveries(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        let names: Vec<String> = self.fields.keys().cloned().collect();
        for name in names {
            let Some(state) = self.field_state(&name) else {
                continue;
            };
            let Some(entry) = self.fields.get_mut(&name) else {
                continue;
            };
            for (id, subscriber) in entry.subscribers.iter_mut() {
                let filtered = state.filtered(subscriber.subscription);
                if !shallow_equal(subscriber.last.as_ref(), Some(&filtered)) {
                    subscriber.last = Some(filtered.clone());
                    deliveries.push(Delivery::Field(
                        subscriber.listener.clone(),
                        name.clone(),
                        *id,
                        filtered,
                    ));
                }
            }
        }
        let form_state = self.form_state();
        for (id, subscriber) in self.form_subscribers.iter_mut() {
            let filtered = form_state.filtered(subscriber.subscription);
            if !shallow_equal(subscriber.last.as_ref(), Some(&filtered)) {
                subscriber.last = Some(filtered.clone());
                deliveries.push(Delivery::Form(subscriber.listener.clone(), *id, filtered));
            }
        }
        deliveries
    }

    fn still_subscribed(&self, delivery: &Delivery) -> bool {
        match delivery {
            Delivery::Field(_, name, id, _) => self
                .fields
                .get(name)
                .is_some_and(|entry| entry.subscribers.contains_key(id)),
            Delivery::Form(_, id, _) => self.form_subscribers.contains_key(id),
        }
    }

    fn validation_plan(&mut self, changed: Option<&str>) -> Option<ValidationPlan> {
        if self.validation_paused {
            self.validation_blocked = true;
            return None;
        }
        let limited = changed
            .and_then(|name| self.fields.get(name))
            .and_then(|entry| entry.validate_fields.clone())
            .zip(changed);
        let names: Vec<String> = match limited {
            Some((mut listed, changed)) => {
                listed.push(changed.to_string());
                listed
            }
            None => self.fields.keys().cloned().collect(),
        };
        let fields = names
            .into_iter()
            .filter_map(|name| {
                let validators = self.fields.get(&name)?.validators();
                Some((name, validators))
            })
            .collect();
        Some(ValidationPlan {
            values: self.values.clone(),
            record: self.config.validate.clone(),
            fields,
        })
    }

    fn apply_validation(&mut self, record: Values, fields: Vec<(String, Option<Value>)>) {
        self.record_errors = record;
        for (name, error) in fields {
            match error {
                Some(error) => {
                    self.field_errors.insert(name, error);
                }
                None => {
                    self.field_errors.remove(&name);
                }
            }
        }
        self.field_errors.retain(|name, _| self.fields.contains_key(name));
        let mut merged = self.record_errors.clone();
        for (name, error) in &self.field_errors {
            set_in(&mut merged, name, Some(error.clone()));
        }
        self.errors = merged;
    }

    /// Replace initial and current values. With `keep_dirty`, fields the
    /// user already edited keep their current value.
    fn initialize(&mut self, values: Values, keep_dirty: bool) {
        let kept: Vec<(String, Option<Value>)> = if keep_dirty {
            self.fields
                .keys()
                .filter(|name| self.field_state(name).is_some_and(|s| s.dirty))
                .map(|name| (name.clone(), get_in(&self.values, name).cloned()))
                .collect()
        } else {
            Vec::new()
        };
        self.initial_values = values.clone();
        self.values = values;
        for (name, value) in kept {
            set_in(&mut self.values, &name, value);
        }
        for entry in self.fields.values_mut() {
            entry.modified = false;
            entry.modified_since_last_submit = false;
        }
    }
}

/// In-memory [`FormApi`] implementation.
#[derive(Clone)]
pub struct MemoryForm {
    inner: Rc<RefCell<Inner>>,
}

impl std::fmt::Debug for MemoryForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MemoryForm")
            .field("values", &inner.values)
            .field("fields", &inner.fields.keys().collect::<Vec<_>>())
            .field("validation_paused", &inner.validation_paused)
            .finish_non_exhaustive()
    }
}

impl MemoryForm {
    /// Build an engine from `config`.
    pub fn new(config: FormConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(config))),
        }
    }

    fn from_weak(weak: &Weak<RefCell<Inner>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Number of registered fields.
    pub fn field_count(&self) -> usize {
        self.inner.borrow().fields.len()
    }

    /// Number of live listeners on `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner
            .borrow()
            .fields
            .get(name)
            .map_or(0, |entry| entry.subscribers.len())
    }

    fn notify(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.batch_depth > 0 || inner.notifying {
                inner.notify_pending = true;
                return;
            }
            inner.notifying = true;
        }
        loop {
            let (deliveries, debug) = {
                let mut inner = self.inner.borrow_mut();
                inner.notify_pending = false;
                let deliveries = inner.collect_deliveries();
                let debug = inner
                    .config
                    .debug
                    .clone()
                    .map(|hook| (hook, inner.form_state()));
                (deliveries, debug)
            };
            for delivery in deliveries {
                if !self.inner.borrow().still_subscribed(&delivery) {
                    continue;
                }
                match delivery {
                    Delivery::Field(listener, _, _, state) => listener(state),
                    Delivery::Form(listener, _, state) => listener(state),
                }
            }
            if let Some((hook, state)) = debug {
                run_debug(&hook, &state);
            }
            let mut inner = self.inner.borrow_mut();
            if !inner.notify_pending {
                inner.notifying = false;
                break;
            }
        }
    }

    fn validate(&self, changed: Option<&str>) {
        let Some(plan) = self.inner.borrow_mut().validation_plan(changed) else {
            return;
        };
        let record = plan
            .record
            .map(|validate| validate(&plan.values))
            .unwrap_or_default();
        let fields = plan
            .fields
            .into_iter()
            .map(|(name, validators)| {
                let value = get_in(&plan.values, &name);
                let error = validators
                    .iter()
                    .find_map(|validator| validator(value, &plan.values));
                (name, error)
            })
            .collect();
        self.inner.borrow_mut().apply_validation(record, fields);
    }

    fn unregister(&self, name: &str, id: u64) {
        {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.fields.get_mut(name) else {
                return;
            };
            if entry.subscribers.remove(&id).is_none() {
                return;
            }
            if entry.subscribers.is_empty() {
                inner.fields.remove(name);
                inner.field_errors.remove(name);
                if inner.config.destroy_on_unregister {
                    set_in(&mut inner.values, name, None);
                }
            }
        }
        tracing::trace!(field = name, "field listener removed");
        self.validate(None);
        self.notify();
    }

    fn field_hooks<T>(&self, pick: impl Fn(&FieldSubscriber) -> Option<T>) -> Vec<T> {
        self.inner
            .borrow()
            .fields
            .values()
            .flat_map(|entry| entry.subscribers.values())
            .filter_map(pick)
            .collect()
    }
}

fn run_debug(hook: &DebugHook, state: &FormState) {
    hook(state);
}

impl FormEngine for MemoryForm {
    fn create(config: FormConfig) -> Self {
        Self::new(config)
    }
}

impl FormApi for MemoryForm {
    fn register_field(
        &self,
        name: &str,
        listener: FieldListener,
        subscription: FieldSubscription,
        config: FieldConfig,
    ) -> Unsubscribe {
        let (id, has_validator) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id();
            let entry = inner
                .fields
                .entry(name.to_string())
                .or_insert_with(FieldEntry::new);
            if !config.data.is_empty() {
                entry.data = config.data.clone();
            }
            if config.is_equal.is_some() {
                entry.is_equal = config.is_equal.clone();
            }
            if config.validate_fields.is_some() {
                entry.validate_fields = config.validate_fields.clone();
            }
            entry.subscribers.insert(
                id,
                FieldSubscriber {
                    listener,
                    subscription,
                    last: None,
                    get_validator: config.get_validator.clone(),
                    before_submit: config.before_submit.clone(),
                    after_submit: config.after_submit.clone(),
                },
            );
            if let Some(initial) = config.initial_value {
                let current = get_in(&inner.values, name);
                if current.is_none() || current == get_in(&inner.initial_values, name) {
                    set_in(&mut inner.initial_values, name, Some(initial.clone()));
                    set_in(&mut inner.values, name, Some(initial));
                }
            }
            if let Some(default) = config.default_value {
                if get_in(&inner.values, name).is_none()
                    && get_in(&inner.initial_values, name).is_none()
                {
                    set_in(&mut inner.values, name, Some(default));
                }
            }
            (id, config.get_validator.is_some())
        };
        tracing::trace!(field = name, id, "field listener added");
        if !config.silent {
            if has_validator {
                self.validate(None);
            }
            self.notify();
        }
        let weak = Rc::downgrade(&self.inner);
        let name = name.to_string();
        Unsubscribe::new(move || {
            if let Some(form) = MemoryForm::from_weak(&weak) {
                form.unregister(&name, id);
            }
        })
    }

    fn subscribe(&self, listener: FormListener, subscription: FormSubscription) -> Unsubscribe {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id();
            inner.form_subscribers.insert(
                id,
                FormSubscriber {
                    listener,
                    subscription,
                    last: None,
                },
            );
            id
        };
        self.notify();
        let weak = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().form_subscribers.remove(&id);
            }
        })
    }

    fn get_state(&self) -> FormState {
        self.inner.borrow().form_state()
    }

    fn get_field_state(&self, name: &str) -> Option<FieldState> {
        self.inner.borrow().field_state(name)
    }

    fn change(&self, name: &str, value: Option<Value>) {
        let validate_on_blur = {
            let mut inner = self.inner.borrow_mut();
            if get_in(&inner.values, name) == value.as_ref() {
                return;
            }
            set_in(&mut inner.values, name, value);
            if let Some(entry) = inner.fields.get_mut(name) {
                entry.modified = true;
                entry.modified_since_last_submit = true;
            }
            inner.config.validate_on_blur
        };
        if !validate_on_blur {
            self.validate(Some(name));
        }
        self.notify();
    }

    fn blur(&self, name: &str) {
        let validate_on_blur = {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.fields.get_mut(name) else {
                return;
            };
            entry.touched = true;
            if inner.active.as_deref() == Some(name) {
                inner.active = None;
            }
            inner.config.validate_on_blur
        };
        if validate_on_blur {
            self.validate(Some(name));
        }
        self.notify();
    }

    fn focus(&self, name: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            let Some(entry) = inner.fields.get_mut(name) else {
                return;
            };
            entry.visited = true;
            inner.active = Some(name.to_string());
        }
        self.notify();
    }

    fn batch(&self, f: &mut dyn FnMut()) {
        self.inner.borrow_mut().batch_depth += 1;
        f();
        let flush = {
            let mut inner = self.inner.borrow_mut();
            inner.batch_depth -= 1;
            inner.batch_depth == 0 && inner.notify_pending
        };
        if flush {
            self.notify();
        }
    }

    fn submit(&self) -> Submission {
        let has_errors = {
            let mut inner = self.inner.borrow_mut();
            if inner.submitting {
                return Submission::Skipped;
            }
            inner.submit_failed = false;
            inner.submit_succeeded = false;
            let has_errors = !inner.errors.is_empty();
            if has_errors {
                for entry in inner.fields.values_mut() {
                    entry.touched = true;
                }
                inner.submit_failed = true;
            }
            has_errors
        };
        if has_errors {
            self.notify();
            return Submission::Skipped;
        }

        let hooks = self.field_hooks(|s| s.before_submit.clone());
        if hooks.iter().any(|hook| !hook()) {
            return Submission::Skipped;
        }

        let (handler, values): (Option<SubmitHandler>, Values) = {
            let mut inner = self.inner.borrow_mut();
            inner.submitting = true;
            (inner.config.on_submit.clone(), inner.values.clone())
        };
        self.notify();

        let errors = match handler {
            Some(handler) => handler(&values, self),
            None => {
                tracing::warn!("submit called without an on_submit handler");
                None
            }
        };
        let succeeded = errors.as_ref().is_none_or(|e| e.is_empty());
        {
            let mut inner = self.inner.borrow_mut();
            inner.submitting = false;
            inner.last_submitted_values = Some(values);
            inner.submit_errors = errors.clone();
            inner.submit_succeeded = succeeded;
            inner.submit_failed = !succeeded;
            for entry in inner.fields.values_mut() {
                entry.modified_since_last_submit = false;
            }
        }
        if succeeded {
            for hook in self.field_hooks(|s| s.after_submit.clone()) {
                hook();
            }
        }
        self.notify();
        Submission::Completed { errors }
    }

    fn reset(&self, values: Option<Values>) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.submit_failed = false;
            inner.submit_succeeded = false;
            inner.submit_errors = None;
            inner.last_submitted_values = None;
            inner.active = None;
            for entry in inner.fields.values_mut() {
                entry.touched = false;
                entry.visited = false;
            }
            let values = values.unwrap_or_else(|| inner.initial_values.clone());
            inner.initialize(values, false);
        }
        self.validate(None);
        self.notify();
    }

    fn initialize(&self, values: Values) {
        {
            let mut inner = self.inner.borrow_mut();
            let keep_dirty = inner.config.keep_dirty_on_reinitialize;
            inner.initialize(values, keep_dirty);
        }
        self.validate(None);
        self.notify();
    }

    fn set_config(&self, update: ConfigUpdate) {
        tracing::trace!(key = update.key(), "engine config updated");
        match update {
            ConfigUpdate::Debug(debug) => self.inner.borrow_mut().config.debug = debug,
            ConfigUpdate::DestroyOnUnregister(destroy) => self.set_destroy_on_unregister(destroy),
            ConfigUpdate::InitialValues(values) => self.initialize(values),
            ConfigUpdate::KeepDirtyOnReinitialize(keep) => {
                self.inner.borrow_mut().config.keep_dirty_on_reinitialize = keep
            }
            ConfigUpdate::Mutators(mutators) => self.inner.borrow_mut().config.mutators = mutators,
            ConfigUpdate::OnSubmit(on_submit) => {
                self.inner.borrow_mut().config.on_submit = Some(on_submit)
            }
            ConfigUpdate::Validate(validate) => {
                self.inner.borrow_mut().config.validate = validate;
                self.validate(None);
                self.notify();
            }
            ConfigUpdate::ValidateOnBlur(on_blur) => {
                self.inner.borrow_mut().config.validate_on_blur = on_blur
            }
        }
    }

    fn pause_validation(&self) {
        self.inner.borrow_mut().validation_paused = true;
    }

    fn resume_validation(&self) {
        let blocked = {
            let mut inner = self.inner.borrow_mut();
            inner.validation_paused = false;
            std::mem::take(&mut inner.validation_blocked)
        };
        if blocked {
            self.validate(None);
            self.notify();
        }
    }

    fn is_validation_paused(&self) -> bool {
        self.inner.borrow().validation_paused
    }

    fn destroy_on_unregister(&self) -> bool {
        self.inner.borrow().config.destroy_on_unregister
    }

    fn set_destroy_on_unregister(&self, destroy: bool) {
        self.inner.borrow_mut().config.destroy_on_unregister = destroy;
    }

    fn mutate(&self, mutator: &str, args: &[Value]) -> bool {
        let Some(mutator) = self.inner.borrow().config.mutators.get(mutator).cloned() else {
            return false;
        };
        let mut values = self.inner.borrow().values.clone();
        mutator(args, &mut values);
        self.inner.borrow_mut().values = values;
        self.validate(None);
        self.notify();
        true
    }

    fn field_names(&self) -> Vec<String> {
        self.inner.borrow().fields.keys().cloned().collect()
    }
}
