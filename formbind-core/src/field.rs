//! Field binding
//!
//! [`Field`] ties one named form field to one rendering unit. It produces a
//! correct first render synchronously from whatever the engine already knows,
//! registers with the engine on commit, and re-renders only when a delivered
//! snapshot differs (shallowly) from the one it rendered last.
//!
//! # Lifecycle
//!
//! ```text
//! Unregistered -> Registering -> Registered -> Unregistering -> Unregistered
//! ```
//!
//! A rename (or a change to the subscription, default value, initial value or
//! data) takes the binding through the whole cycle once: the old registration
//! is always cleaned up before the new one is made.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::api::{
    AfterSubmit, BeforeSubmit, FieldConfig, FieldState, FieldValidator, FormApi, FormHandle,
    IsEqual, Unsubscribe,
};
use crate::context::{use_form, Scope};
use crate::error::{BindingError, BindingResult};
use crate::event::{ChangeEvent, ControlType, Platform};
use crate::hooks::{Callback, ConstantCallback, Effect, Latest, StateCell};
use crate::path::{get_in, Values};
use crate::render::{render_with, Component, RenderStrategy};
use crate::subscription::{flatten_subscription, FieldSubscription, SubscriptionKeys};
use crate::value::{default_format, default_parse, get_value, unpack_warning, Format, Parse};

const CONSTRUCT: &str = "Field";

/// Where a [`Field`] is in its registration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPhase {
    #[default]
    Unregistered,
    Registering,
    Registered,
    Unregistering,
}

/// Configuration of a [`Field`].
pub struct FieldProps<V> {
    pub name: String,
    /// Attributes to listen to; `None` listens to all of them.
    pub subscription: Option<FieldSubscription>,
    pub validate: Option<FieldValidator>,
    pub validate_fields: Option<Vec<String>>,
    pub is_equal: Option<IsEqual>,
    pub initial_value: Option<Value>,
    pub default_value: Option<Value>,
    pub data: Values,
    /// Display transform; `None` uses [`default_format`].
    pub format: Option<Format>,
    /// Input transform; `None` uses [`default_parse`].
    pub parse: Option<Parse>,
    pub format_on_blur: bool,
    pub allow_null: bool,
    pub multiple: bool,
    pub input_type: Option<ControlType>,
    /// Pinned value of a checkbox or radio button.
    pub value: Option<Value>,
    pub before_submit: Option<BeforeSubmit>,
    pub after_submit: Option<AfterSubmit>,
    /// Keep the field's engine state when this binding goes away.
    pub retain_on_unmount: bool,
    pub renderer: RenderStrategy<FieldRenderProps, V>,
}

impl<V> Default for FieldProps<V> {
    fn default() -> Self {
        Self {
            name: String::new(),
            subscription: None,
            validate: None,
            validate_fields: None,
            is_equal: None,
            initial_value: None,
            default_value: None,
            data: Values::new(),
            format: None,
            parse: None,
            format_on_blur: false,
            allow_null: false,
            multiple: false,
            input_type: None,
            value: None,
            before_submit: None,
            after_submit: None,
            retain_on_unmount: false,
            renderer: RenderStrategy::default(),
        }
    }
}

impl<V> Clone for FieldProps<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            subscription: self.subscription,
            validate: self.validate.clone(),
            validate_fields: self.validate_fields.clone(),
            is_equal: self.is_equal.clone(),
            initial_value: self.initial_value.clone(),
            default_value: self.default_value.clone(),
            data: self.data.clone(),
            format: self.format.clone(),
            parse: self.parse.clone(),
            format_on_blur: self.format_on_blur,
            allow_null: self.allow_null,
            multiple: self.multiple,
            input_type: self.input_type.clone(),
            value: self.value.clone(),
            before_submit: self.before_submit.clone(),
            after_submit: self.after_submit.clone(),
            retain_on_unmount: self.retain_on_unmount,
            renderer: self.renderer.clone(),
        }
    }
}

impl<V> fmt::Debug for FieldProps<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProps")
            .field("name", &self.name)
            .field("subscription", &self.subscription)
            .field("initial_value", &self.initial_value)
            .field("default_value", &self.default_value)
            .field("format_on_blur", &self.format_on_blur)
            .field("input_type", &self.input_type)
            .field("value", &self.value)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl<V> FieldProps<V> {
    /// Props for the field at `name` (dot/bracket path).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Listen to these field attributes only.
    pub fn subscription(mut self, subscription: FieldSubscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Field-level validator, given the value and all form values.
    pub fn validate(
        mut self,
        f: impl Fn(Option<&Value>, &Values) -> Option<Value> + 'static,
    ) -> Self {
        self.validate = Some(Rc::new(f));
        self
    }

    /// Other fields to revalidate whenever this one changes.
    pub fn validate_fields(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.validate_fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Equality the engine uses to compute `pristine`.
    pub fn is_equal(
        mut self,
        f: impl Fn(Option<&Value>, Option<&Value>) -> bool + 'static,
    ) -> Self {
        self.is_equal = Some(Rc::new(f));
        self
    }

    /// Initial value registered with the engine.
    pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Value seeded at registration when neither a value nor an initial value exists.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Metadata stored on the field state.
    pub fn data(mut self, data: Values) -> Self {
        self.data = data;
        self
    }

    /// Store value to display value. Runs at render unless `format_on_blur`.
    pub fn format(mut self, f: impl Fn(Option<&Value>, &str) -> Option<Value> + 'static) -> Self {
        self.format = Some(Rc::new(f));
        self
    }

    /// Display value to store value, applied on change.
    pub fn parse(mut self, f: impl Fn(Option<Value>, &str) -> Option<Value> + 'static) -> Self {
        self.parse = Some(Rc::new(f));
        self
    }

    /// Format once on blur instead of on every render.
    pub fn format_on_blur(mut self) -> Self {
        self.format_on_blur = true;
        self
    }

    /// Keep `null` values instead of displaying them as `""`.
    pub fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Bind a multi-select; values are arrays.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// The control kind; checkbox and radio change how the value is bound.
    pub fn input_type(mut self, control: impl Into<ControlType>) -> Self {
        self.input_type = Some(control.into());
        self
    }

    /// Value a checkbox or radio stands for.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Returning `false` cancels the form submission.
    pub fn before_submit(mut self, f: impl Fn() -> bool + 'static) -> Self {
        self.before_submit = Some(Rc::new(f));
        self
    }

    /// Called after a successful submission.
    pub fn after_submit(mut self, f: impl Fn() + 'static) -> Self {
        self.after_submit = Some(Rc::new(f));
        self
    }

    /// Keep the value in the engine after unmount, even with destroy-on-unregister.
    pub fn retain_on_unmount(mut self) -> Self {
        self.retain_on_unmount = true;
        self
    }

    /// Render through a component.
    pub fn component(mut self, component: impl Component<FieldRenderProps, V> + 'static) -> Self {
        self.renderer.component = Some(Rc::new(component));
        self
    }

    /// Render through a function.
    pub fn render(mut self, f: impl Fn(&FieldRenderProps) -> V + 'static) -> Self {
        self.renderer.render = Some(Rc::new(f));
        self
    }

    /// Render through a children function.
    pub fn children(mut self, f: impl Fn(&FieldRenderProps) -> V + 'static) -> Self {
        self.renderer.children = Some(Rc::new(f));
        self
    }
}

/// The slice of props long-lived closures read at call time.
#[derive(Clone)]
struct FieldSettings {
    name: String,
    validate: Option<FieldValidator>,
    format: Format,
    parse: Parse,
    format_on_blur: bool,
    allow_null: bool,
    multiple: bool,
    input_type: Option<ControlType>,
    value: Option<Value>,
    before_submit: Option<BeforeSubmit>,
    after_submit: Option<AfterSubmit>,
    retain_on_unmount: bool,
}

impl FieldSettings {
    fn from_props<V>(props: &FieldProps<V>) -> Self {
        Self {
            name: props.name.clone(),
            validate: props.validate.clone(),
            format: props.format.clone().unwrap_or_else(|| Rc::new(default_format)),
            parse: props.parse.clone().unwrap_or_else(|| Rc::new(default_parse)),
            format_on_blur: props.format_on_blur,
            allow_null: props.allow_null,
            multiple: props.multiple,
            input_type: props.input_type.clone(),
            value: props.value.clone(),
            before_submit: props.before_submit.clone(),
            after_submit: props.after_submit.clone(),
            retain_on_unmount: props.retain_on_unmount,
        }
    }

    fn is_choice(&self) -> bool {
        matches!(
            self.input_type,
            Some(ControlType::Checkbox) | Some(ControlType::Radio)
        )
    }
}

/// Falsy in the sense of native form controls.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Commit the formatted value back when formatting changes it.
fn commit_formatted(form: &dyn FormApi, settings: &FieldSettings, name: &str) {
    let current = form.get_field_state(name).and_then(|state| state.value);
    let formatted = (settings.format)(current.as_ref(), name);
    if formatted != current {
        form.change(name, formatted);
    }
}

/// The three input handlers. Each keeps its identity for the binding's
/// whole life and does nothing while the binding is not registered.
struct Handlers {
    change: ConstantCallback<ChangeEvent>,
    blur: ConstantCallback<()>,
    focus: ConstantCallback<()>,
}

impl Handlers {
    fn stand_in() -> Self {
        Self {
            change: ConstantCallback::new(|_: ChangeEvent| {}),
            blur: ConstantCallback::new(|_: ()| {}),
            focus: ConstantCallback::new(|_: ()| {}),
        }
    }

    fn bind(&self, form: &FormHandle, settings: &Latest<FieldSettings>, platform: Platform) {
        let (f, s) = (form.clone(), settings.clone());
        self.change.update(move |event: ChangeEvent| {
            let settings = s.get();
            let name = settings.name.as_str();
            let current = f.get_field_state(name).and_then(|state| state.value);
            if cfg!(debug_assertions) {
                if let Some(target) = event.target() {
                    let shown = match target.control {
                        ControlType::SelectMultiple => current.as_ref(),
                        _ => settings.value.as_ref(),
                    };
                    if let Some(message) =
                        unpack_warning(target, settings.input_type.as_ref(), name, shown)
                    {
                        tracing::warn!(field = name, "{message}");
                    }
                }
            }
            let value = get_value(&event, current.as_ref(), settings.value.as_ref(), platform);
            f.change(name, (settings.parse)(value, name));
        });

        let (f, s) = (form.clone(), settings.clone());
        self.blur.update(move |()| {
            let settings = s.get();
            f.blur(&settings.name);
            if settings.format_on_blur {
                commit_formatted(f.as_ref(), &settings, &settings.name);
            }
        });

        let (f, s) = (form.clone(), settings.clone());
        self.focus.update(move |()| s.with(|settings| f.focus(&settings.name)));
    }

    fn unbind(&self) {
        self.change.update(|_: ChangeEvent| {});
        self.blur.update(|_: ()| {});
        self.focus.update(|_: ()| {});
    }
}

/// Registration dependencies: a change to any of these re-registers.
#[derive(Debug, Clone, PartialEq)]
struct RegistrationKey {
    name: String,
    subscription: String,
    default_value: Option<Value>,
    initial_value: Option<Value>,
    data: Values,
}

/// Everything the registration effect needs, detached from `&mut Field`.
struct Registration {
    form: FormHandle,
    settings: Latest<FieldSettings>,
    snapshot: Rc<StateCell<FieldState>>,
    handlers: Rc<Handlers>,
    phase: Rc<Cell<FieldPhase>>,
    platform: Platform,
    subscription: FieldSubscription,
    config: FieldConfig,
    name: String,
    /// Initial value for a field the engine has purged, taken from the
    /// form's initial values.
    seed: Option<Value>,
}

impl Registration {
    fn register(self) -> Unsubscribe {
        let Registration {
            form,
            settings,
            snapshot,
            handlers,
            phase,
            platform,
            subscription,
            config,
            name,
            seed,
        } = self;

        if form.get_field_state(&name).is_none() {
            let missing = get_in(&form.get_state().values, &name).is_none();
            if let (true, Some(seed)) = (missing, seed) {
                form.change(&name, Some(seed));
            }
        }

        phase.set(FieldPhase::Registering);
        let live = Rc::new(Cell::new(true));
        let listener = {
            let (live, snapshot, settings) = (live.clone(), snapshot.clone(), settings.clone());
            Rc::new(move |state: FieldState| {
                let renamed = settings.with(|s| s.name != state.name);
                if !live.get() || renamed {
                    return;
                }
                let name = state.name.clone();
                if !snapshot.offer(state) {
                    tracing::trace!(field = %name, "suppressed unchanged field state");
                }
            })
        };
        let mut unregister = form.register_field(&name, listener, subscription, config);
        handlers.bind(&form, &settings, platform);
        phase.set(FieldPhase::Registered);
        tracing::debug!(field = %name, "field registered");

        Unsubscribe::new(move || {
            phase.set(FieldPhase::Unregistering);
            live.set(false);
            handlers.unbind();
            if settings.with(|s| s.retain_on_unmount) {
                let destroy = form.destroy_on_unregister();
                form.set_destroy_on_unregister(false);
                unregister.call();
                form.set_destroy_on_unregister(destroy);
            } else {
                unregister.call();
            }
            phase.set(FieldPhase::Unregistered);
            tracing::debug!(field = %name, "field unregistered");
        })
    }
}

/// A field binding.
pub struct Field<V> {
    form: FormHandle,
    platform: Platform,
    props: FieldProps<V>,
    subscription: FieldSubscription,
    settings: Latest<FieldSettings>,
    snapshot: Rc<StateCell<FieldState>>,
    handlers: Rc<Handlers>,
    phase: Rc<Cell<FieldPhase>>,
    registration: Effect<RegistrationKey>,
}

impl<V> fmt::Debug for Field<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.props.name)
            .field("phase", &self.phase.get())
            .field("subscription", &self.subscription)
            .field("state", &self.snapshot.get())
            .finish_non_exhaustive()
    }
}

impl<V> Field<V> {
    /// Create a binding inside the form provided by `scope`.
    pub fn new(scope: &Scope, props: FieldProps<V>) -> BindingResult<Self> {
        let form = use_form(scope, CONSTRUCT)?;
        if props.name.is_empty() {
            return Err(BindingError::MissingName {
                construct: CONSTRUCT,
            });
        }
        let subscription = props.subscription.unwrap_or_else(FieldSubscription::all);
        let state = initial_state(form.as_ref(), &props).filtered(subscription);
        Ok(Self {
            platform: scope.platform(),
            settings: Latest::new(FieldSettings::from_props(&props)),
            snapshot: Rc::new(StateCell::new(state)),
            handlers: Rc::new(Handlers::stand_in()),
            phase: Rc::new(Cell::new(FieldPhase::Unregistered)),
            registration: Effect::new(),
            subscription,
            props,
            form,
        })
    }

    /// Path this field is bound to.
    pub fn name(&self) -> &str {
        &self.props.name
    }

    /// Where the field is in its registration lifecycle.
    pub fn phase(&self) -> FieldPhase {
        self.phase.get()
    }

    /// The snapshot the next render will show.
    pub fn state(&self) -> Rc<FieldState> {
        self.snapshot.get()
    }

    /// Whether engine activity has produced a snapshot not yet rendered.
    pub fn needs_render(&self) -> bool {
        self.snapshot.is_stale()
    }

    /// Replace the props; the host renders and commits afterwards.
    pub fn update(&mut self, props: FieldProps<V>) -> BindingResult<()> {
        if props.name.is_empty() {
            return Err(BindingError::MissingName {
                construct: CONSTRUCT,
            });
        }
        self.subscription = props.subscription.unwrap_or_else(FieldSubscription::all);
        self.settings.set(FieldSettings::from_props(&props));
        self.props = props;
        self.snapshot.set_stale(true);
        Ok(())
    }

    /// Render from the current snapshot, reseeding it first after a rename.
    pub fn render(&mut self) -> BindingResult<V> {
        self.snapshot.set_stale(false);
        if self.snapshot.get().name != self.props.name {
            let state = initial_state(self.form.as_ref(), &self.props).filtered(self.subscription);
            self.snapshot.replace(state);
        }
        let props = self.render_props();
        render_with(&self.props.renderer, &props, CONSTRUCT)
    }

    /// Props the renderer receives, built from the current snapshot.
    pub fn render_props(&self) -> FieldRenderProps {
        let state = self.snapshot.get();
        FieldRenderProps {
            input: FieldInput {
                state: Rc::clone(&state),
                settings: Rc::new(self.settings.get()),
                on_change: self.handlers.change.callback(),
                on_blur: self.handlers.blur.callback(),
                on_focus: self.handlers.focus.callback(),
            },
            meta: FieldMeta {
                state,
                subscription: self.subscription,
            },
        }
    }

    /// Run the registration effect after the render was committed.
    pub fn commit(&mut self) {
        let key = RegistrationKey {
            name: self.props.name.clone(),
            subscription: flatten_subscription(Some(self.subscription)),
            default_value: self.props.default_value.clone(),
            initial_value: self.props.initial_value.clone(),
            data: self.props.data.clone(),
        };
        let registration = self.registration();
        self.registration.run(key, move || registration.register());
    }

    /// Teardown that an immediately following [`Field::commit`] undoes.
    pub fn suspend(&mut self) {
        self.registration.suspend();
    }

    /// Final teardown.
    pub fn unmount(self) {
        drop(self);
    }

    fn registration(&self) -> Registration {
        let props = &self.props;
        let get_validator = {
            let settings = self.settings.clone();
            Rc::new(move || settings.with(|s| s.validate.clone()))
        };
        let before_submit: BeforeSubmit = {
            let form = Rc::downgrade(&self.form);
            let settings = self.settings.clone();
            let name = props.name.clone();
            Rc::new(move || {
                let settings = settings.get();
                if settings.format_on_blur {
                    if let Some(form) = Weak::upgrade(&form) {
                        commit_formatted(form.as_ref(), &settings, &name);
                    }
                }
                settings.before_submit.as_ref().is_none_or(|hook| hook())
            })
        };
        let after_submit: AfterSubmit = {
            let settings = self.settings.clone();
            Rc::new(move || {
                if let Some(hook) = settings.with(|s| s.after_submit.clone()) {
                    hook();
                }
            })
        };
        Registration {
            form: self.form.clone(),
            settings: self.settings.clone(),
            snapshot: self.snapshot.clone(),
            handlers: self.handlers.clone(),
            phase: self.phase.clone(),
            platform: self.platform,
            subscription: self.subscription,
            config: FieldConfig {
                after_submit: Some(after_submit),
                before_submit: Some(before_submit),
                data: props.data.clone(),
                default_value: props.default_value.clone(),
                get_validator: Some(get_validator),
                initial_value: props.initial_value.clone(),
                is_equal: props.is_equal.clone(),
                silent: false,
                validate_fields: props.validate_fields.clone(),
            },
            name: props.name.clone(),
            seed: get_in(&self.form.get_state().initial_values, &props.name).cloned(),
        }
    }
}

impl<V> Drop for Field<V> {
    fn drop(&mut self) {
        self.registration.dispose();
    }
}

/// Engine state for `props.name`, or a plausible stand-in when the engine
/// has no record of it yet.
fn initial_state<V>(form: &dyn FormApi, props: &FieldProps<V>) -> FieldState {
    if let Some(state) = form.get_field_state(&props.name) {
        return state;
    }
    let form_state = form.get_state();
    let initial = get_in(&form_state.initial_values, &props.name)
        .cloned()
        .or_else(|| props.initial_value.clone());
    let value = get_in(&form_state.values, &props.name)
        .cloned()
        .or_else(|| initial.clone())
        .or_else(|| props.default_value.clone())
        .or_else(|| props.multiple.then(|| Value::Array(Vec::new())));
    FieldState {
        name: props.name.clone(),
        data: props.data.clone(),
        initial,
        length: value.as_ref().and_then(Value::as_array).map(Vec::len),
        pristine: true,
        valid: true,
        value,
        ..FieldState::default()
    }
}

/// What a field's renderer receives.
#[derive(Clone)]
pub struct FieldRenderProps {
    pub input: FieldInput,
    pub meta: FieldMeta,
}

impl fmt::Debug for FieldRenderProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRenderProps")
            .field("input", &self.input)
            .field("meta", &self.meta)
            .finish()
    }
}

/// The props to spread onto the input control.
///
/// `value` and `checked` are computed when read.
#[derive(Clone)]
pub struct FieldInput {
    state: Rc<FieldState>,
    settings: Rc<FieldSettings>,
    pub on_change: Callback<ChangeEvent>,
    pub on_blur: Callback<()>,
    pub on_focus: Callback<()>,
}

impl fmt::Debug for FieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInput")
            .field("name", &self.name())
            .field("value", &self.value())
            .field("checked", &self.checked())
            .finish_non_exhaustive()
    }
}

impl FieldInput {
    /// Path of the bound field.
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// The value to show in the control.
    pub fn value(&self) -> Option<Value> {
        let settings = &self.settings;
        let name = settings.name.as_str();
        if settings.is_choice() {
            return settings.value.clone();
        }
        let mut value = if settings.format_on_blur {
            default_format(self.state.value.as_ref(), name)
        } else {
            (settings.format)(self.state.value.as_ref(), name)
        };
        if value == Some(Value::Null) && !settings.allow_null {
            value = Some(Value::String(String::new()));
        }
        if settings.multiple && !truthy(value.as_ref()) {
            return Some(Value::Array(Vec::new()));
        }
        value
    }

    /// Selection state of a checkbox or radio button; `None` for other
    /// controls.
    pub fn checked(&self) -> Option<bool> {
        let settings = &self.settings;
        match settings.input_type {
            Some(ControlType::Checkbox) => {
                let value = (settings.format)(self.state.value.as_ref(), &settings.name);
                Some(match &settings.value {
                    None => truthy(value.as_ref()),
                    Some(pinned) => {
                        matches!(&value, Some(Value::Array(items)) if items.contains(pinned))
                    }
                })
            }
            Some(ControlType::Radio) => Some(self.state.value == settings.value),
            _ => None,
        }
    }

    /// Whether this is a multi-select.
    pub fn multiple(&self) -> bool {
        self.settings.multiple
    }

    /// Control kind, if one was given.
    pub fn input_type(&self) -> Option<&ControlType> {
        self.settings.input_type.as_ref()
    }

    /// Shorthand for calling `on_change`.
    pub fn change(&self, event: impl Into<ChangeEvent>) {
        self.on_change.call(event.into());
    }

    /// Mark the field blurred.
    pub fn blur(&self) {
        self.on_blur.call(());
    }

    /// Mark the field active.
    pub fn focus(&self) {
        self.on_focus.call(());
    }
}

/// Field metadata, read on demand from the rendered snapshot.
#[derive(Clone)]
pub struct FieldMeta {
    state: Rc<FieldState>,
    subscription: FieldSubscription,
}

impl fmt::Debug for FieldMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

macro_rules! meta_flags {
    ($($field:ident),+ $(,)?) => {
        $(
            /// Flag read from the snapshot.
            pub fn $field(&self) -> bool {
                self.state.$field
            }
        )+
    };
}

impl FieldMeta {
    meta_flags!(
        active,
        dirty,
        dirty_since_last_submit,
        invalid,
        modified,
        modified_since_last_submit,
        pristine,
        submit_failed,
        submit_succeeded,
        submitting,
        touched,
        valid,
        validating,
        visited,
    );

    /// Arbitrary metadata registered with the field.
    pub fn data(&self) -> &Values {
        &self.state.data
    }

    /// Current validation error.
    pub fn error(&self) -> Option<&Value> {
        self.state.error.as_ref()
    }

    /// Initial value at the field's path.
    pub fn initial(&self) -> Option<&Value> {
        self.state.initial.as_ref()
    }

    /// Length of an array value.
    pub fn length(&self) -> Option<usize> {
        self.state.length
    }

    /// Error returned by the last submission.
    pub fn submit_error(&self) -> Option<&Value> {
        self.state.submit_error.as_ref()
    }

    /// A meta attribute by its camelCase key. `None` for unknown keys and
    /// for attributes without a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        let state = &self.state;
        let flag = |b: bool| Some(Value::Bool(b));
        match key {
            "active" => flag(state.active),
            "data" => Some(Value::Object(state.data.clone())),
            "dirty" => flag(state.dirty),
            "dirtySinceLastSubmit" => flag(state.dirty_since_last_submit),
            "error" => state.error.clone(),
            "initial" => state.initial.clone(),
            "invalid" => flag(state.invalid),
            "length" => state.length.map(Value::from),
            "modified" => flag(state.modified),
            "modifiedSinceLastSubmit" => flag(state.modified_since_last_submit),
            "pristine" => flag(state.pristine),
            "submitError" => state.submit_error.clone(),
            "submitFailed" => flag(state.submit_failed),
            "submitSucceeded" => flag(state.submit_succeeded),
            "submitting" => flag(state.submitting),
            "touched" => flag(state.touched),
            "valid" => flag(state.valid),
            "validating" => flag(state.validating),
            "visited" => flag(state.visited),
            _ => None,
        }
    }

    /// Subscribed meta attributes as `(key, value)` pairs, skipping the
    /// ones without a value.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Value)> + '_ {
        self.subscription
            .key_names()
            .filter(|key| *key != "value")
            .filter_map(|key| self.get(key).map(|value| (key, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FormConfig;
    use crate::context::FormContext;
    use crate::event::{EventTarget, InputEvent};
    use crate::testing::{values, MemoryForm, RecordingForm, RenderCount};
    use serde_json::json;
    use std::cell::RefCell;

    fn scope_with(form: impl FormApi + 'static) -> (Scope, FormHandle) {
        let form: FormHandle = Rc::new(form);
        (Scope::root().provide(FormContext(form.clone())), form)
    }

    fn memory(initial: Value) -> MemoryForm {
        MemoryForm::new(FormConfig {
            initial_values: Some(values(initial)),
            ..FormConfig::default()
        })
    }

    fn value_of(props: &FieldRenderProps) -> Option<Value> {
        props.input.value()
    }

    #[test]
    fn test_requires_form() {
        let err = Field::new(&Scope::root(), FieldProps::<()>::new("name")).err();
        assert_eq!(err, Some(BindingError::MissingForm { construct: "Field" }));
    }

    #[test]
    fn test_requires_name() {
        let (scope, _) = scope_with(memory(json!({})));
        let err = Field::new(&scope, FieldProps::<()>::default()).err();
        assert_eq!(err, Some(BindingError::MissingName { construct: "Field" }));
    }

    #[test]
    fn test_requires_renderer() {
        let (scope, _) = scope_with(memory(json!({})));
        let mut field = Field::new(&scope, FieldProps::<()>::new("name")).expect("field");
        assert_eq!(
            field.render(),
            Err(BindingError::NoRenderer { construct: "Field" })
        );
    }

    #[test]
    fn test_first_render_reads_initial_values() {
        let (scope, _) = scope_with(memory(json!({"user": {"name": "erik"}})));
        let mut field =
            Field::new(&scope, FieldProps::new("user.name").render(value_of)).expect("field");
        assert_eq!(field.phase(), FieldPhase::Unregistered);
        assert_eq!(field.render(), Ok(Some(json!("erik"))));
        assert!(field.state().pristine);
    }

    #[test]
    fn test_first_render_fallbacks() {
        let (scope, _) = scope_with(memory(json!({})));
        let mut initial = Field::new(
            &scope,
            FieldProps::new("a").initial_value("x").render(value_of),
        )
        .expect("field");
        assert_eq!(initial.render(), Ok(Some(json!("x"))));

        let mut default = Field::new(
            &scope,
            FieldProps::new("b").default_value(3).render(value_of),
        )
        .expect("field");
        assert_eq!(default.render(), Ok(Some(json!(3))));

        let mut multi = Field::new(
            &scope,
            FieldProps::new("c")
                .multiple()
                .input_type("select-multiple")
                .render(value_of),
        )
        .expect("field");
        assert_eq!(multi.render(), Ok(Some(json!([]))));

        let mut empty = Field::new(&scope, FieldProps::new("d").render(value_of)).expect("field");
        assert_eq!(empty.render(), Ok(Some(json!(""))));
    }

    #[test]
    fn test_commit_registers_and_binds_handlers() {
        let (scope, form) = scope_with(memory(json!({})));
        let mut field = Field::new(&scope, FieldProps::new("name").render(|p: &FieldRenderProps| p.clone()))
            .expect("field");
        let props = field.render().expect("render");

        props.input.change("ignored");
        assert!(form.get_state().values.is_empty());

        field.commit();
        assert_eq!(field.phase(), FieldPhase::Registered);
        assert_eq!(form.field_names(), vec!["name".to_string()]);

        props.input.change("typed");
        assert_eq!(form.get_state().values.get("name"), Some(&json!("typed")));
        assert!(field.needs_render());
        let props = field.render().expect("render");
        assert_eq!(props.input.value(), Some(json!("typed")));
        assert!(props.meta.dirty());
    }

    #[test]
    fn test_handlers_keep_identity() {
        let (scope, _) = scope_with(memory(json!({})));
        let mut field = Field::new(&scope, FieldProps::new("x").render(|p: &FieldRenderProps| p.clone()))
            .expect("field");
        let before = field.render().expect("render").input;
        field.commit();
        field
            .update(FieldProps::new("x").format_on_blur().render(|p: &FieldRenderProps| p.clone()))
            .expect("update");
        let after = field.render().expect("render").input;
        assert!(before.on_change.ptr_eq(&after.on_change));
        assert!(before.on_blur.ptr_eq(&after.on_blur));
        assert!(before.on_focus.ptr_eq(&after.on_focus));
    }

    #[test]
    fn test_value_subscription_ignores_focus() {
        let (scope, form) = scope_with(memory(json!({"name": "erik"})));
        let renders = RenderCount::new();
        let count = renders.clone();
        let mut field = Field::new(
            &scope,
            FieldProps::new("name")
                .subscription(FieldSubscription::VALUE)
                .render(move |p: &FieldRenderProps| {
                    count.tick();
                    p.clone()
                }),
        )
        .expect("field");
        let props = field.render().expect("render");
        field.commit();
        assert!(!field.needs_render());

        props.input.focus();
        props.input.blur();
        assert!(!field.needs_render());
        assert_eq!(renders.get(), 1);

        form.change("name", Some(json!("erikras")));
        assert!(field.needs_render());
    }

    #[test]
    fn test_dropping_empty_subscription_reregisters() {
        let recording = Rc::new(RecordingForm::new(memory(json!({}))));
        let form: FormHandle = recording.clone();
        let scope = Scope::root().provide(FormContext(form.clone()));
        let mut field = Field::new(
            &scope,
            FieldProps::new("name")
                .subscription(FieldSubscription::empty())
                .render(value_of),
        )
        .expect("field");
        field.render().expect("render");
        field.commit();

        field.update(FieldProps::new("name").render(value_of)).expect("update");
        field.render().expect("render");
        field.commit();
        assert_eq!(recording.register_count("name"), 2);
        assert_eq!(recording.unregister_count("name"), 1);

        if field.needs_render() {
            field.render().expect("render");
        }
        form.change("name", Some(json!("erik")));
        assert!(field.needs_render());
        assert_eq!(field.render(), Ok(Some(json!("erik"))));
    }

    #[test]
    fn test_meta_iter_lists_subscribed_keys() {
        let (scope, _) = scope_with(memory(json!({})));
        let mut field = Field::new(
            &scope,
            FieldProps::new("name")
                .subscription(FieldSubscription::VALUE | FieldSubscription::TOUCHED | FieldSubscription::ERROR)
                .render(|p: &FieldRenderProps| p.meta.clone()),
        )
        .expect("field");
        let meta = field.render().expect("render");
        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["touched"]);
        assert_eq!(meta.get("touched"), Some(json!(false)));
        assert_eq!(meta.get("bogus"), None);
    }

    #[test]
    fn test_checkbox_and_radio_inputs() {
        let (scope, form) = scope_with(memory(json!({"tags": ["a"], "color": "red", "agree": true})));
        let checkbox = |pinned: &str| {
            Field::new(
                &scope,
                FieldProps::new("tags")
                    .input_type("checkbox")
                    .value(pinned)
                    .render(|p: &FieldRenderProps| p.input.clone()),
            )
            .expect("field")
        };
        let mut a = checkbox("a");
        let mut b = checkbox("b");
        let input_a = a.render().expect("render");
        let input_b = b.render().expect("render");
        assert_eq!(input_a.value(), Some(json!("a")));
        assert_eq!(input_a.checked(), Some(true));
        assert_eq!(input_b.checked(), Some(false));

        b.commit();
        input_b.change(InputEvent::target(EventTarget::checkbox(true)));
        assert_eq!(form.get_state().values.get("tags"), Some(&json!(["a", "b"])));

        let mut radio = Field::new(
            &scope,
            FieldProps::new("color")
                .input_type("radio")
                .value("red")
                .render(|p: &FieldRenderProps| p.input.clone()),
        )
        .expect("field");
        assert_eq!(radio.render().expect("render").checked(), Some(true));

        let mut single = Field::new(
            &scope,
            FieldProps::new("agree")
                .input_type("checkbox")
                .render(|p: &FieldRenderProps| p.input.clone()),
        )
        .expect("field");
        let input = single.render().expect("render");
        assert_eq!(input.checked(), Some(true));
        assert_eq!(input.value(), None);
    }

    #[test]
    fn test_null_coercion() {
        let (scope, _) = scope_with(memory(json!({"a": null})));
        let mut coerced = Field::new(&scope, FieldProps::new("a").render(value_of)).expect("field");
        assert_eq!(coerced.render(), Ok(Some(json!(""))));
        let mut kept =
            Field::new(&scope, FieldProps::new("a").allow_null().render(value_of)).expect("field");
        assert_eq!(kept.render(), Ok(Some(Value::Null)));
    }

    #[test]
    fn test_format_on_blur_before_submit() {
        let submitted = Rc::new(RefCell::new(None));
        let sink = submitted.clone();
        let form = MemoryForm::new(FormConfig {
            on_submit: Some(Rc::new(move |v: &Values, _: &dyn FormApi| {
                *sink.borrow_mut() = Some(v.clone());
                None
            })),
            ..FormConfig::default()
        });
        let (scope, form) = scope_with(form);
        let mut field = Field::new(
            &scope,
            FieldProps::new("name")
                .format_on_blur()
                .format(|v: Option<&Value>, _: &str| {
                    v.and_then(Value::as_str).map(|s| json!(s.trim()))
                })
                .render(|p: &FieldRenderProps| p.input.clone()),
        )
        .expect("field");
        let input = field.render().expect("render");
        field.commit();
        input.change("  padded  ");
        form.submit();
        assert_eq!(
            submitted.borrow().as_ref().and_then(|v| v.get("name").cloned()),
            Some(json!("padded"))
        );
    }

    #[test]
    fn test_before_submit_can_cancel() {
        let form = MemoryForm::new(FormConfig {
            on_submit: Some(Rc::new(|_: &Values, _: &dyn FormApi| None)),
            ..FormConfig::default()
        });
        let (scope, form) = scope_with(form);
        let mut field = Field::new(
            &scope,
            FieldProps::new("x").before_submit(|| false).render(|_: &FieldRenderProps| ()),
        )
        .expect("field");
        field.commit();
        assert_eq!(form.submit(), crate::api::Submission::Skipped);
    }

    #[test]
    fn test_suspend_then_commit_keeps_registration() {
        let recording = Rc::new(RecordingForm::new(memory(json!({}))));
        let form: FormHandle = recording.clone();
        let scope = Scope::root().provide(FormContext(form));
        let mut field = Field::new(&scope, FieldProps::new("x").render(|_: &FieldRenderProps| ()))
            .expect("field");
        field.commit();
        field.suspend();
        field.commit();
        assert_eq!(recording.register_count("x"), 1);
        assert_eq!(recording.unregister_count("x"), 0);

        field.unmount();
        assert_eq!(recording.unregister_count("x"), 1);
    }

    #[test]
    fn test_retain_on_unmount() {
        let form = MemoryForm::new(FormConfig {
            destroy_on_unregister: true,
            ..FormConfig::default()
        });
        let (scope, form) = scope_with(form);
        let mut kept = Field::new(
            &scope,
            FieldProps::new("kept").retain_on_unmount().render(|_: &FieldRenderProps| ()),
        )
        .expect("field");
        let mut purged =
            Field::new(&scope, FieldProps::new("purged").render(|_: &FieldRenderProps| ()))
                .expect("field");
        kept.commit();
        purged.commit();
        form.change("kept", Some(json!(1)));
        form.change("purged", Some(json!(2)));

        kept.unmount();
        purged.unmount();
        let state = form.get_state();
        assert_eq!(state.values.get("kept"), Some(&json!(1)));
        assert_eq!(state.values.get("purged"), None);
        assert!(form.destroy_on_unregister());
    }

    #[test]
    fn test_remount_reseeds_purged_value() {
        let form = MemoryForm::new(FormConfig {
            destroy_on_unregister: true,
            initial_values: Some(values(json!({"name": "erik"}))),
            ..FormConfig::default()
        });
        let (scope, form) = scope_with(form);
        let mut first =
            Field::new(&scope, FieldProps::new("name").render(value_of)).expect("field");
        first.commit();
        first.unmount();
        assert!(form.get_state().values.is_empty());

        let mut second =
            Field::new(&scope, FieldProps::new("name").render(value_of)).expect("field");
        assert_eq!(second.render(), Ok(Some(json!("erik"))));
        second.commit();
        assert_eq!(form.get_state().values.get("name"), Some(&json!("erik")));
        assert!(form.get_field_state("name").is_some_and(|s| s.pristine));
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!(0))));
        assert!(truthy(Some(&json!([]))));
        assert!(truthy(Some(&json!("x"))));
    }
}
