//! Form-state spy
//!
//! [`FormSpy`] watches the state of the enclosing form without owning its
//! engine. It either renders like any other binding, or, given an
//! `on_change` callback, renders nothing and reports each distinct snapshot
//! from [`FormSpy::commit`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::api::{FormHandle, FormState, FormSubscription, Unsubscribe};
use crate::context::{use_form, Scope};
use crate::error::BindingResult;
use crate::hooks::{Effect, StateCell};
use crate::render::{render_with, Component, RenderStrategy};
use crate::subscription::flatten_subscription;

const CONSTRUCT: &str = "FormSpy";

/// Receives each distinct form-state snapshot.
pub type SpyListener = Rc<dyn Fn(&FormState)>;

/// What a spy's renderer receives.
#[derive(Clone)]
pub struct FormSpyRenderProps {
    pub form: FormHandle,
    pub state: Rc<FormState>,
}

impl fmt::Debug for FormSpyRenderProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSpyRenderProps")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Configuration of a [`FormSpy`].
pub struct FormSpyProps<V> {
    pub subscription: Option<FormSubscription>,
    /// Observe instead of render.
    pub on_change: Option<SpyListener>,
    pub renderer: RenderStrategy<FormSpyRenderProps, V>,
}

impl<V> Default for FormSpyProps<V> {
    fn default() -> Self {
        Self {
            subscription: None,
            on_change: None,
            renderer: RenderStrategy::default(),
        }
    }
}

impl<V> fmt::Debug for FormSpyProps<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSpyProps")
            .field("subscription", &self.subscription)
            .field("on_change", &self.on_change.is_some())
            .field("renderer", &self.renderer)
            .finish()
    }
}

impl<V> FormSpyProps<V> {
    /// Empty props; pick a renderer or `on_change`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to these form attributes only.
    pub fn subscription(mut self, subscription: FormSubscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Observe snapshots instead of rendering.
    pub fn on_change(mut self, f: impl Fn(&FormState) + 'static) -> Self {
        self.on_change = Some(Rc::new(f));
        self
    }

    /// Render through a component.
    pub fn component(
        mut self,
        component: impl Component<FormSpyRenderProps, V> + 'static,
    ) -> Self {
        self.renderer.component = Some(Rc::new(component));
        self
    }

    /// Render through a function.
    pub fn render(mut self, f: impl Fn(&FormSpyRenderProps) -> V + 'static) -> Self {
        self.renderer.render = Some(Rc::new(f));
        self
    }

    /// Render through a children function.
    pub fn children(mut self, f: impl Fn(&FormSpyRenderProps) -> V + 'static) -> Self {
        self.renderer.children = Some(Rc::new(f));
        self
    }
}

/// A form-state observer.
pub struct FormSpy<V> {
    form: FormHandle,
    props: FormSpyProps<V>,
    snapshot: Rc<StateCell<FormState>>,
    /// Snapshots waiting for the next commit, oldest first.
    pending: Rc<RefCell<Vec<Rc<FormState>>>>,
    observing: Rc<Cell<bool>>,
    subscription: Effect<String>,
}

impl<V> fmt::Debug for FormSpy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSpy")
            .field("props", &self.props)
            .field("pending", &self.pending.borrow().len())
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl<V> FormSpy<V> {
    /// Create the spy with a snapshot of the enclosing form's current state.
    pub fn new(scope: &Scope, props: FormSpyProps<V>) -> BindingResult<Self> {
        let form = use_form(scope, CONSTRUCT)?;
        let subscription = props.subscription.unwrap_or_else(FormSubscription::all);
        let snapshot = Rc::new(StateCell::new(form.get_state().filtered(subscription)));
        let pending = Rc::new(RefCell::new(Vec::new()));
        if props.on_change.is_some() {
            pending.borrow_mut().push(snapshot.get());
        }
        Ok(Self {
            observing: Rc::new(Cell::new(props.on_change.is_some())),
            form,
            props,
            snapshot,
            pending,
            subscription: Effect::new(),
        })
    }

    /// The most recent snapshot.
    pub fn state(&self) -> Rc<FormState> {
        self.snapshot.get()
    }

    /// Whether a new snapshot arrived since the last render.
    pub fn needs_render(&self) -> bool {
        self.snapshot.is_stale()
    }

    /// Replace the props; takes effect at the next render and commit.
    pub fn update(&mut self, props: FormSpyProps<V>) {
        self.props = props;
        self.snapshot.set_stale(true);
    }

    /// Render, or `Ok(None)` when observing through `on_change`.
    pub fn render(&mut self) -> BindingResult<Option<V>> {
        self.snapshot.set_stale(false);
        if self.props.on_change.is_some() {
            return Ok(None);
        }
        let props = FormSpyRenderProps {
            form: self.form.clone(),
            state: self.snapshot.get(),
        };
        render_with(&self.props.renderer, &props, CONSTRUCT).map(Some)
    }

    /// Subscribe if needed, then deliver queued snapshots to `on_change`.
    pub fn commit(&mut self) {
        let form = self.form.clone();
        let snapshot = self.snapshot.clone();
        let pending = self.pending.clone();
        let observing = self.observing.clone();
        observing.set(self.props.on_change.is_some());
        let subscription = self.props.subscription.unwrap_or_else(FormSubscription::all);
        self.subscription
            .run(flatten_subscription(Some(subscription)), move || {
                let listener = Rc::new(move |state: FormState| {
                    if !snapshot.offer(state) {
                        tracing::trace!("suppressed unchanged spy state");
                        return;
                    }
                    if observing.get() {
                        pending.borrow_mut().push(snapshot.get());
                    }
                });
                let mut unsubscribe = form.subscribe(listener, subscription);
                tracing::debug!("spy subscribed");
                Unsubscribe::new(move || unsubscribe.call())
            });

        let Some(on_change) = self.props.on_change.clone() else {
            self.pending.borrow_mut().clear();
            return;
        };
        let queued = std::mem::take(&mut *self.pending.borrow_mut());
        for state in queued {
            on_change(&state);
        }
    }

    /// Teardown that an immediately following [`FormSpy::commit`] undoes.
    pub fn suspend(&mut self) {
        self.subscription.suspend();
    }

    /// Final teardown.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<V> Drop for FormSpy<V> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}
