//! Form binding
//!
//! [`Form`] owns one engine for a subtree of bindings. It publishes the
//! engine through a child [`Scope`], keeps validation paused until the first
//! commit so every descendant field is registered before anything is
//! validated, subscribes to form state, and pushes prop changes into the
//! engine's live configuration.

use std::fmt;
use std::rc::Rc;

use crate::api::{
    ConfigUpdate, DebugHook, FormApi, FormConfig, FormEngine, FormHandle, FormState,
    FormSubscription, Mutators, RecordValidator, Submission, SubmitHandler, Unsubscribe,
};
use crate::context::{FormContext, Scope};
use crate::error::BindingResult;
use crate::event::UiEvent;
use crate::hooks::{Callback, Effect, OnceGuard, StateCell, WhenChanged};
use crate::path::Values;
use crate::render::{render_with, Component, RenderStrategy};
use crate::shallow::shallow_equal;
use crate::subscription::flatten_subscription;

const CONSTRUCT: &str = "Form";

/// Attached to the engine once per engine lifetime; the returned handle
/// detaches it.
pub type Decorator = Rc<dyn Fn(&FormHandle) -> Unsubscribe>;

/// Equality used to decide whether new initial values reinitialize the form.
pub type ValuesEqual = Rc<dyn Fn(Option<&Values>, Option<&Values>) -> bool>;

/// Configuration of a [`Form`].
pub struct FormProps<V> {
    pub on_submit: Option<SubmitHandler>,
    pub initial_values: Option<Values>,
    /// Defaults to shallow equality.
    pub initial_values_equal: Option<ValuesEqual>,
    pub keep_dirty_on_reinitialize: bool,
    pub mutators: Mutators,
    pub validate: Option<RecordValidator>,
    pub validate_on_blur: bool,
    pub debug: Option<DebugHook>,
    pub decorators: Vec<Decorator>,
    /// Attributes to listen to; `None` listens to all of them. Changing it
    /// after mount resubscribes, but is not meant for regular use.
    pub subscription: Option<FormSubscription>,
    pub destroy_on_unregister: bool,
    /// An engine built elsewhere, used instead of creating one.
    pub form: Option<FormHandle>,
    pub renderer: RenderStrategy<FormRenderProps, V>,
}

impl<V> Default for FormProps<V> {
    fn default() -> Self {
        Self {
            on_submit: None,
            initial_values: None,
            initial_values_equal: None,
            keep_dirty_on_reinitialize: false,
            mutators: Mutators::new(),
            validate: None,
            validate_on_blur: false,
            debug: None,
            decorators: Vec::new(),
            subscription: None,
            destroy_on_unregister: false,
            form: None,
            renderer: RenderStrategy::default(),
        }
    }
}

impl<V> Clone for FormProps<V> {
    fn clone(&self) -> Self {
        Self {
            on_submit: self.on_submit.clone(),
            initial_values: self.initial_values.clone(),
            initial_values_equal: self.initial_values_equal.clone(),
            keep_dirty_on_reinitialize: self.keep_dirty_on_reinitialize,
            mutators: self.mutators.clone(),
            validate: self.validate.clone(),
            validate_on_blur: self.validate_on_blur,
            debug: self.debug.clone(),
            decorators: self.decorators.clone(),
            subscription: self.subscription,
            destroy_on_unregister: self.destroy_on_unregister,
            form: self.form.clone(),
            renderer: self.renderer.clone(),
        }
    }
}

impl<V> fmt::Debug for FormProps<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormProps")
            .field("has_on_submit", &self.on_submit.is_some())
            .field("initial_values", &self.initial_values)
            .field("keep_dirty_on_reinitialize", &self.keep_dirty_on_reinitialize)
            .field("mutators", &self.mutators.keys().collect::<Vec<_>>())
            .field("validate_on_blur", &self.validate_on_blur)
            .field("decorators", &self.decorators.len())
            .field("subscription", &self.subscription)
            .field("destroy_on_unregister", &self.destroy_on_unregister)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl<V> FormProps<V> {
    /// Empty props; a renderer and `on_submit` are still needed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submission handler. Returning errors marks the submission failed.
    pub fn on_submit(mut self, f: impl Fn(&Values, &dyn FormApi) -> Option<Values> + 'static) -> Self {
        self.on_submit = Some(Rc::new(f));
        self
    }

    /// Values the form starts from.
    pub fn initial_values(mut self, values: Values) -> Self {
        self.initial_values = Some(values);
        self
    }

    /// Replace shallow equality when comparing new initial values.
    pub fn initial_values_equal(
        mut self,
        f: impl Fn(Option<&Values>, Option<&Values>) -> bool + 'static,
    ) -> Self {
        self.initial_values_equal = Some(Rc::new(f));
        self
    }

    /// Keep dirty values when initial values change.
    pub fn keep_dirty_on_reinitialize(mut self) -> Self {
        self.keep_dirty_on_reinitialize = true;
        self
    }

    /// Register a named mutator on the engine.
    pub fn mutator(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[serde_json::Value], &mut Values) + 'static,
    ) -> Self {
        self.mutators.insert(name.into(), Rc::new(f));
        self
    }

    /// Record-level validator returning errors keyed by field path.
    pub fn validate(mut self, f: impl Fn(&Values) -> Values + 'static) -> Self {
        self.validate = Some(Rc::new(f));
        self
    }

    /// Validate on blur instead of on every change.
    pub fn validate_on_blur(mut self) -> Self {
        self.validate_on_blur = true;
        self
    }

    /// Called with the form state after every notification.
    pub fn debug(mut self, f: impl Fn(&FormState) + 'static) -> Self {
        self.debug = Some(Rc::new(f));
        self
    }

    /// Attach a decorator to the engine.
    pub fn decorator(mut self, f: impl Fn(&FormHandle) -> Unsubscribe + 'static) -> Self {
        self.decorators.push(Rc::new(f));
        self
    }

    /// Listen to these form attributes only.
    pub fn subscription(mut self, subscription: FormSubscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Purge a field's value when its last registration goes away.
    pub fn destroy_on_unregister(mut self) -> Self {
        self.destroy_on_unregister = true;
        self
    }

    /// Use this engine instead of creating one.
    pub fn form(mut self, form: FormHandle) -> Self {
        self.form = Some(form);
        self
    }

    /// Render through a component.
    pub fn component(mut self, component: impl Component<FormRenderProps, V> + 'static) -> Self {
        self.renderer.component = Some(Rc::new(component));
        self
    }

    /// Render through a function.
    pub fn render(mut self, f: impl Fn(&FormRenderProps) -> V + 'static) -> Self {
        self.renderer.render = Some(Rc::new(f));
        self
    }

    /// Render through a children function.
    pub fn children(mut self, f: impl Fn(&FormRenderProps) -> V + 'static) -> Self {
        self.renderer.children = Some(Rc::new(f));
        self
    }

    /// Engine configuration these props describe.
    pub fn config(&self) -> FormConfig {
        FormConfig {
            debug: self.debug.clone(),
            destroy_on_unregister: self.destroy_on_unregister,
            initial_values: self.initial_values.clone(),
            keep_dirty_on_reinitialize: self.keep_dirty_on_reinitialize,
            mutators: self.mutators.clone(),
            on_submit: self.on_submit.clone(),
            validate: self.validate.clone(),
            validate_on_blur: self.validate_on_blur,
        }
    }
}

/// Argument of [`Form::reset`].
#[derive(Debug, Clone, Default)]
pub enum ResetArg {
    /// Reset to the current initial values.
    #[default]
    Initial,
    /// Reset triggered by a UI occurrence, e.g. a reset button.
    Event(UiEvent),
    /// Reseed the form with these values.
    Values(Values),
}

impl ResetArg {
    /// Values to pass to the engine; UI occurrences carry none.
    pub fn into_values(self) -> Option<Values> {
        match self {
            ResetArg::Values(values) => Some(values),
            ResetArg::Initial | ResetArg::Event(_) => None,
        }
    }
}

impl From<UiEvent> for ResetArg {
    fn from(event: UiEvent) -> Self {
        ResetArg::Event(event)
    }
}

impl From<Values> for ResetArg {
    fn from(values: Values) -> Self {
        ResetArg::Values(values)
    }
}

impl From<Option<Values>> for ResetArg {
    fn from(values: Option<Values>) -> Self {
        values.map_or(ResetArg::Initial, ResetArg::Values)
    }
}

/// What a form's renderer receives.
#[derive(Clone)]
pub struct FormRenderProps {
    pub form: FormHandle,
    pub state: Rc<FormState>,
    pub handle_submit: Callback<Option<UiEvent>, Submission>,
    pub reset: Callback<ResetArg>,
}

impl fmt::Debug for FormRenderProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRenderProps")
            .field("state", &self.state)
            .field("handle_submit", &self.handle_submit)
            .field("reset", &self.reset)
            .finish_non_exhaustive()
    }
}

impl FormRenderProps {
    /// Submit, stopping the event first if one is given.
    pub fn submit(&self, event: Option<&UiEvent>) -> Submission {
        self.handle_submit.call(event.cloned())
    }
}

fn same_rc<T: ?Sized>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn same_mutators(a: &Mutators, b: &Mutators) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|((ka, fa), (kb, fb))| ka == kb && Rc::ptr_eq(fa, fb))
}

/// Change detectors for every hot-reloadable prop.
struct ConfigWatchers {
    debug: WhenChanged<Option<DebugHook>>,
    destroy_on_unregister: WhenChanged<bool>,
    keep_dirty_on_reinitialize: WhenChanged<bool>,
    initial_values: WhenChanged<Option<Values>>,
    mutators: WhenChanged<Mutators>,
    on_submit: WhenChanged<Option<SubmitHandler>>,
    validate: WhenChanged<Option<RecordValidator>>,
    validate_on_blur: WhenChanged<bool>,
}

impl ConfigWatchers {
    fn new<V>(props: &FormProps<V>) -> Self {
        Self {
            debug: WhenChanged::new(props.debug.clone()),
            destroy_on_unregister: WhenChanged::new(props.destroy_on_unregister),
            keep_dirty_on_reinitialize: WhenChanged::new(props.keep_dirty_on_reinitialize),
            initial_values: WhenChanged::new(props.initial_values.clone()),
            mutators: WhenChanged::new(props.mutators.clone()),
            on_submit: WhenChanged::new(props.on_submit.clone()),
            validate: WhenChanged::new(props.validate.clone()),
            validate_on_blur: WhenChanged::new(props.validate_on_blur),
        }
    }

    /// Push every prop that changed since the last commit.
    fn apply<V>(&mut self, form: &dyn FormApi, props: &FormProps<V>) {
        let set = |update: ConfigUpdate| form.set_config(update);
        self.debug.observe(props.debug.clone(), same_rc, |debug| {
            set(ConfigUpdate::Debug(debug.clone()))
        });
        self.destroy_on_unregister
            .observe_eq(props.destroy_on_unregister, |destroy| {
                set(ConfigUpdate::DestroyOnUnregister(*destroy))
            });
        self.keep_dirty_on_reinitialize
            .observe_eq(props.keep_dirty_on_reinitialize, |keep| {
                set(ConfigUpdate::KeepDirtyOnReinitialize(*keep))
            });
        let values_equal = |a: &Option<Values>, b: &Option<Values>| match &props.initial_values_equal {
            Some(equal) => equal(a.as_ref(), b.as_ref()),
            None => shallow_equal(a.as_ref(), b.as_ref()),
        };
        self.initial_values
            .observe(props.initial_values.clone(), values_equal, |values| {
                set(ConfigUpdate::InitialValues(values.clone().unwrap_or_default()))
            });
        self.mutators
            .observe(props.mutators.clone(), same_mutators, |mutators| {
                set(ConfigUpdate::Mutators(mutators.clone()))
            });
        self.on_submit
            .observe(props.on_submit.clone(), same_rc, |on_submit| match on_submit {
                Some(on_submit) => set(ConfigUpdate::OnSubmit(on_submit.clone())),
                None => tracing::warn!("on_submit removed from a mounted form; keeping the previous handler"),
            });
        self.validate.observe(props.validate.clone(), same_rc, |validate| {
            set(ConfigUpdate::Validate(validate.clone()))
        });
        self.validate_on_blur
            .observe_eq(props.validate_on_blur, |on_blur| {
                set(ConfigUpdate::ValidateOnBlur(*on_blur))
            });
    }
}

/// A form binding.
pub struct Form<V> {
    form: FormHandle,
    scope: Scope,
    props: FormProps<V>,
    snapshot: Rc<StateCell<FormState>>,
    watchers: ConfigWatchers,
    subscription: Effect<String>,
    resume: OnceGuard,
    handle_submit: Callback<Option<UiEvent>, Submission>,
    reset: Callback<ResetArg>,
}

impl<V> fmt::Debug for Form<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("props", &self.props)
            .field("state", &self.snapshot.get())
            .field("subscription", &self.subscription)
            .field("resume", &self.resume)
            .finish_non_exhaustive()
    }
}

impl<V> Form<V> {
    /// Create the binding, building an `E` unless `props.form` supplies an
    /// engine. Validation stays paused until the first [`Form::commit`].
    pub fn new<E: FormEngine>(scope: &Scope, props: FormProps<V>) -> Self {
        let form: FormHandle = match &props.form {
            Some(form) => form.clone(),
            None => {
                if cfg!(debug_assertions) && props.on_submit.is_none() {
                    tracing::warn!("Missing on_submit function in Form props");
                }
                Rc::new(E::create(props.config()))
            }
        };
        form.pause_validation();

        let subscription = props.subscription.unwrap_or_else(FormSubscription::all);
        let snapshot = Rc::new(StateCell::new(form.get_state().filtered(subscription)));
        let handle_submit = {
            let form = form.clone();
            Callback::new(move |event: Option<UiEvent>| {
                if let Some(event) = &event {
                    event.prevent_default();
                    event.stop_propagation();
                }
                form.submit()
            })
        };
        let reset = {
            let form = form.clone();
            Callback::new(move |arg: ResetArg| {
                if let ResetArg::Event(event) = &arg {
                    if !event.is_ui_event() {
                        tracing::trace!("reset with an occurrence that cannot stop propagation");
                    }
                }
                form.reset(arg.into_values())
            })
        };
        Self {
            scope: scope.provide(FormContext(form.clone())),
            watchers: ConfigWatchers::new(&props),
            subscription: Effect::new(),
            resume: OnceGuard::new(),
            snapshot,
            handle_submit,
            reset,
            props,
            form,
        }
    }

    /// Scope to construct descendant bindings in.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The engine this binding owns or was given.
    pub fn form(&self) -> &FormHandle {
        &self.form
    }

    /// Latest form-state snapshot.
    pub fn state(&self) -> Rc<FormState> {
        self.snapshot.get()
    }

    /// Whether form state changed since the last render.
    pub fn needs_render(&self) -> bool {
        self.snapshot.is_stale()
    }

    /// Replace the props; the host renders and commits afterwards. The
    /// engine stays the one chosen at construction.
    pub fn update(&mut self, props: FormProps<V>) {
        self.props = props;
        self.snapshot.set_stale(true);
    }

    /// Render from the current snapshot.
    pub fn render(&mut self) -> BindingResult<V> {
        self.snapshot.set_stale(false);
        let props = self.render_props();
        render_with(&self.props.renderer, &props, CONSTRUCT)
    }

    /// Props the renderer receives.
    pub fn render_props(&self) -> FormRenderProps {
        FormRenderProps {
            form: self.form.clone(),
            state: self.snapshot.get(),
            handle_submit: self.handle_submit.clone(),
            reset: self.reset.clone(),
        }
    }

    /// Run the form's effects. Call after every descendant committed.
    pub fn commit(&mut self) {
        let form = self.form.clone();
        let snapshot = self.snapshot.clone();
        let decorators = self.props.decorators.clone();
        let subscription = self.props.subscription.unwrap_or_else(FormSubscription::all);
        let resubscribed = self.subscription.run(
            flatten_subscription(Some(subscription)),
            move || {
                let listener = {
                    let snapshot = snapshot.clone();
                    Rc::new(move |state: FormState| {
                        if !snapshot.offer(state) {
                            tracing::trace!("suppressed unchanged form state");
                        }
                    })
                };
                let mut attached = vec![form.subscribe(listener, subscription)];
                attached.extend(decorators.iter().map(|decorate| decorate(&form)));
                tracing::debug!(decorators = decorators.len(), "form subscribed");
                Unsubscribe::new(move || {
                    while let Some(mut detach) = attached.pop() {
                        detach.call();
                    }
                    tracing::debug!("form unsubscribed");
                })
            },
        );
        if resubscribed {
            tracing::trace!(subscription = ?subscription, "form subscription set up");
        }

        self.watchers.apply(self.form.as_ref(), &self.props);

        let form = self.form.clone();
        self.resume.setup(move || {
            if form.is_validation_paused() {
                form.resume_validation();
                tracing::debug!("validation resumed");
            }
            Unsubscribe::new(move || form.pause_validation())
        });
    }

    /// Teardown that an immediately following [`Form::commit`] undoes.
    pub fn suspend(&mut self) {
        self.subscription.suspend();
        self.resume.release();
    }

    /// Final teardown; leaves validation paused.
    pub fn unmount(self) {
        drop(self);
    }

    /// Submit the form, stopping the UI occurrence that triggered it.
    pub fn handle_submit(&self, event: Option<&UiEvent>) -> Submission {
        self.handle_submit.call(event.cloned())
    }

    /// Reset to initial values, or reseed with the values given.
    pub fn reset(&self, arg: impl Into<ResetArg>) {
        self.reset.call(arg.into());
    }
}

impl<V> Drop for Form<V> {
    fn drop(&mut self) {
        self.resume.cleanup();
        self.subscription.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FieldConfig, FieldState, FieldSubscription};
    use crate::testing::{values, EngineCall, MemoryForm, RecordingForm};
    use crate::{assert_called, assert_not_called, count_called};
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};

    fn state_of(props: &FormRenderProps) -> Rc<FormState> {
        props.state.clone()
    }

    fn submit_props() -> FormProps<Rc<FormState>> {
        FormProps::new()
            .on_submit(|_: &Values, _: &dyn FormApi| None)
            .render(state_of)
    }

    fn counting_submit(count: &Rc<Cell<usize>>) -> impl Fn(&Values, &dyn FormApi) -> Option<Values> {
        let count = count.clone();
        move |_: &Values, _: &dyn FormApi| {
            count.set(count.get() + 1);
            None
        }
    }

    #[test]
    fn test_pauses_until_commit() {
        let mut form = Form::new::<MemoryForm>(&Scope::root(), submit_props());
        assert!(form.form().is_validation_paused());
        form.render().expect("render");
        form.commit();
        assert!(!form.form().is_validation_paused());
    }

    #[test]
    fn test_scope_publishes_engine() {
        let form = Form::new::<MemoryForm>(&Scope::root(), submit_props());
        let found = crate::context::use_form(form.scope(), "Field").expect("form");
        assert!(Rc::ptr_eq(&found, form.form()));
        assert!(crate::context::use_form(&Scope::root(), "Field").is_err());
    }

    #[test]
    fn test_missing_renderer() {
        let mut form = Form::<()>::new::<MemoryForm>(&Scope::root(), FormProps::new());
        assert_eq!(
            form.render(),
            Err(crate::error::BindingError::NoRenderer { construct: "Form" })
        );
    }

    #[test]
    fn test_supplied_engine_is_used() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let handle: FormHandle = recording.clone();
        let mut form = Form::new::<MemoryForm>(&Scope::root(), submit_props().form(handle.clone()));
        assert!(Rc::ptr_eq(form.form(), &handle));
        form.commit();
        let calls = recording.calls();
        assert_eq!(calls.first(), Some(&EngineCall::PauseValidation));
        assert_called!(calls, EngineCall::Subscribe);
        assert_called!(calls, EngineCall::ResumeValidation);
    }

    #[test]
    fn test_handle_submit_stops_event() {
        let submitted = Rc::new(Cell::new(0));
        let count = submitted.clone();
        let props = FormProps::new()
            .on_submit(move |_: &Values, _: &dyn FormApi| {
                count.set(count.get() + 1);
                None
            })
            .render(state_of);
        let mut form = Form::new::<MemoryForm>(&Scope::root(), props);
        form.commit();

        let prevented = Rc::new(Cell::new(false));
        let stopped = Rc::new(Cell::new(false));
        let (p, s) = (prevented.clone(), stopped.clone());
        let event = UiEvent::new()
            .on_prevent_default(move || p.set(true))
            .on_stop_propagation(move || s.set(true));
        assert_eq!(
            form.handle_submit(Some(&event)),
            Submission::Completed { errors: None }
        );
        assert!(prevented.get() && stopped.get());

        let bare = UiEvent::new();
        form.handle_submit(Some(&bare));
        form.handle_submit(None);
        assert_eq!(submitted.get(), 3);
    }

    #[test]
    fn test_reset_distinguishes_events_from_values() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let form = Form::new::<MemoryForm>(&Scope::root(), submit_props().form(recording.clone()));

        form.reset(UiEvent::new().on_stop_propagation(|| {}));
        form.reset(values(json!({"a": 1})));
        form.reset(ResetArg::Initial);
        let resets: Vec<EngineCall> = recording
            .calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Reset(_)))
            .collect();
        assert_eq!(
            resets,
            vec![
                EngineCall::Reset(None),
                EngineCall::Reset(Some(values(json!({"a": 1})))),
                EngineCall::Reset(None),
            ]
        );
    }

    #[test]
    fn test_hot_reload_pushes_changed_config() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let props = submit_props()
            .form(recording.clone())
            .initial_values(values(json!({"a": 1})));
        let mut form = Form::new::<MemoryForm>(&Scope::root(), props.clone());
        form.commit();
        recording.drain_calls();

        form.update(props.clone().initial_values(values(json!({"a": 1}))));
        form.commit();
        assert_not_called!(recording.calls(), EngineCall::SetConfig(_));

        form.update(
            props
                .clone()
                .initial_values(values(json!({"a": 2})))
                .validate_on_blur()
                .validate(|_: &Values| Values::new()),
        );
        form.commit();
        let calls = recording.drain_calls();
        assert_called!(calls, EngineCall::SetConfig("initialValues"));
        assert_called!(calls, EngineCall::SetConfig("validateOnBlur"));
        assert_called!(calls, EngineCall::SetConfig("validate"));
        assert_eq!(count_called!(calls, EngineCall::SetConfig(_)), 3);
        assert_eq!(
            form.form().get_state().initial_values,
            values(json!({"a": 2}))
        );
    }

    #[test]
    fn test_hot_reload_swaps_on_submit() {
        let (first, second) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let mut form = Form::new::<MemoryForm>(
            &Scope::root(),
            FormProps::new().on_submit(counting_submit(&first)).render(state_of),
        );
        form.commit();
        form.handle_submit(None);

        form.update(FormProps::new().on_submit(counting_submit(&second)).render(state_of));
        form.commit();
        form.handle_submit(None);
        assert_eq!((first.get(), second.get()), (1, 1));

        form.update(FormProps::new().render(state_of));
        form.commit();
        assert_eq!(
            form.handle_submit(None),
            Submission::Completed { errors: None }
        );
        assert_eq!((first.get(), second.get()), (1, 2));
    }

    #[test]
    fn test_hot_reload_swaps_debug_and_mutators() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let props = submit_props().form(recording.clone());
        let mut form = Form::new::<MemoryForm>(&Scope::root(), props.clone());
        form.commit();
        assert!(!form.form().mutate("rename", &[json!("odie")]));
        recording.drain_calls();

        let debugged = Rc::new(Cell::new(0));
        let hits = debugged.clone();
        form.update(
            props
                .clone()
                .debug(move |_: &FormState| hits.set(hits.get() + 1))
                .mutator("rename", |args: &[Value], values: &mut Values| {
                    if let Some(name) = args.first() {
                        values.insert("name".to_string(), name.clone());
                    }
                }),
        );
        form.commit();
        let calls = recording.drain_calls();
        assert_called!(calls, EngineCall::SetConfig("debug"));
        assert_called!(calls, EngineCall::SetConfig("mutators"));
        assert_eq!(count_called!(calls, EngineCall::SetConfig(_)), 2);

        assert!(form.form().mutate("rename", &[json!("odie")]));
        assert_eq!(
            form.form().get_state().values.get("name"),
            Some(&json!("odie"))
        );
        assert!(debugged.get() > 0);
    }

    #[test]
    fn test_hot_reload_pushes_flags_before_initial_values() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig {
            initial_values: Some(values(json!({"name": "erik"}))),
            ..FormConfig::default()
        })));
        let props = submit_props().form(recording.clone());
        let mut form = Form::new::<MemoryForm>(&Scope::root(), props.clone());
        form.commit();
        let listener: crate::api::FieldListener = Rc::new(|_: FieldState| {});
        let mut unregister = form.form().register_field(
            "name",
            listener,
            FieldSubscription::all(),
            FieldConfig::default(),
        );
        form.form().change("name", Some(json!("erikras")));
        recording.drain_calls();

        form.update(
            props
                .keep_dirty_on_reinitialize()
                .destroy_on_unregister()
                .initial_values(values(json!({"name": "odie"}))),
        );
        form.commit();
        let calls = recording.drain_calls();
        assert_called!(calls, EngineCall::SetConfig("keepDirtyOnReinitialize"));
        assert_called!(calls, EngineCall::SetConfig("destroyOnUnregister"));
        assert_called!(calls, EngineCall::SetConfig("initialValues"));
        assert_eq!(count_called!(calls, EngineCall::SetConfig(_)), 3);

        let state = form.form().get_state();
        assert_eq!(state.initial_values, values(json!({"name": "odie"})));
        assert_eq!(state.values.get("name"), Some(&json!("erikras")));

        assert!(recording.destroy_on_unregister());
        unregister.call();
        assert_eq!(form.form().get_state().values.get("name"), None);
    }

    #[test]
    fn test_dropping_empty_subscription_resubscribes() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let props = submit_props().form(recording.clone());
        let mut form = Form::new::<MemoryForm>(
            &Scope::root(),
            props.clone().subscription(FormSubscription::empty()),
        );
        form.render().expect("render");
        form.commit();

        form.update(props);
        form.render().expect("render");
        form.commit();
        let calls = recording.calls();
        assert_eq!(count_called!(calls, EngineCall::Subscribe), 2);
        assert_eq!(count_called!(calls, EngineCall::Unsubscribe), 1);

        if form.needs_render() {
            form.render().expect("render");
        }
        form.form().change("name", Some(json!("erik")));
        assert!(form.needs_render());
        let state = form.render().expect("render");
        assert_eq!(state.values.get("name"), Some(&json!("erik")));
    }

    #[test]
    fn test_custom_initial_values_equal() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let props = submit_props()
            .form(recording.clone())
            .initial_values(values(json!({"a": 1})))
            .initial_values_equal(|_: Option<&Values>, _: Option<&Values>| true);
        let mut form = Form::new::<MemoryForm>(&Scope::root(), props.clone());
        form.commit();
        form.update(props.initial_values(values(json!({"a": 99}))));
        form.commit();
        assert_not_called!(recording.calls(), EngineCall::SetConfig(_));
    }

    #[test]
    fn test_decorators_detach_in_reverse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let decorator = |id: u32| {
            let log = log.clone();
            move |_: &FormHandle| {
                log.borrow_mut().push(format!("attach {id}"));
                let log = log.clone();
                Unsubscribe::new(move || log.borrow_mut().push(format!("detach {id}")))
            }
        };
        let props = submit_props().decorator(decorator(1)).decorator(decorator(2));
        let mut form = Form::new::<MemoryForm>(&Scope::root(), props);
        form.commit();
        form.suspend();
        form.commit();
        form.unmount();
        assert_eq!(
            *log.borrow(),
            vec!["attach 1", "attach 2", "detach 2", "detach 1"]
        );
    }

    #[test]
    fn test_subscription_gates_renders() {
        let mut form = Form::new::<MemoryForm>(
            &Scope::root(),
            submit_props().subscription(FormSubscription::SUBMITTING),
        );
        form.render().expect("render");
        form.commit();
        assert!(!form.needs_render());
        form.form().change("anything", Some(json!(1)));
        assert!(!form.needs_render());

        let mut all = Form::new::<MemoryForm>(&Scope::root(), submit_props());
        all.commit();
        all.form().change("anything", Some(json!(1)));
        assert!(all.needs_render());
        let state = all.render().expect("render");
        assert_eq!(state.values.get("anything"), Some(&json!(1)));
    }

    #[test]
    fn test_unmount_pauses_validation() {
        let recording = Rc::new(RecordingForm::new(MemoryForm::new(FormConfig::default())));
        let mut form = Form::new::<MemoryForm>(&Scope::root(), submit_props().form(recording.clone()));
        form.commit();
        form.unmount();
        assert!(recording.is_validation_paused());
        assert_eq!(recording.calls().last(), Some(&EngineCall::Unsubscribe));
    }
}
