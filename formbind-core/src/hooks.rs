//! Lifecycle and timing helpers shared by the bindings
//!
//! These stand in for the state/effect primitives a UI runtime would offer:
//!
//! - [`Latest`]: a cell long-lived closures read at call time
//! - [`ConstantCallback`] / [`Callback`]: stable identity over a changing closure
//! - [`WhenChanged`]: react to a value changing between renders
//! - [`OnceGuard`]: setup that survives an unmount/remount double invocation
//! - [`Effect`]: dependency-keyed setup/cleanup slot built on the guard
//! - [`StateCell`]: rendered snapshot plus a "newer one waiting" flag

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::api::Unsubscribe;
use crate::shallow::{shallow_equal, ShallowEq};

/// Shared cell holding the most recently rendered value.
pub struct Latest<T>(Rc<RefCell<T>>);

impl<T> Clone for Latest<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Latest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Latest").field(&self.0.borrow()).finish()
    }
}

impl<T> Latest<T> {
    /// Hold `value` as the latest.
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Replace the latest value.
    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    /// Borrow the latest value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }
}

impl<T: Clone> Latest<T> {
    /// Clone the latest value.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

/// A shareable callback whose identity can be compared.
pub struct Callback<A, R = ()>(Rc<dyn Fn(A) -> R>);

impl<A, R> Clone for Callback<A, R> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A, R> fmt::Debug for Callback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

impl<A, R> Callback<A, R> {
    /// Wrap a function.
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the wrapped function.
    pub fn call(&self, arg: A) -> R {
        (self.0)(arg)
    }

    /// Whether both handles are the same callback.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Stable callback delegating to a replaceable implementation.
///
/// [`ConstantCallback::callback`] always returns the same [`Callback`];
/// calling it dispatches to whatever was last passed to
/// [`ConstantCallback::update`].
pub struct ConstantCallback<A, R = ()> {
    current: Rc<RefCell<Rc<dyn Fn(A) -> R>>>,
    stable: Callback<A, R>,
}

impl<A, R> fmt::Debug for ConstantCallback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantCallback")
            .field("stable", &self.stable)
            .finish()
    }
}

impl<A: 'static, R: 'static> ConstantCallback<A, R> {
    /// A stable callback that forwards to `f` until updated.
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        let current: Rc<RefCell<Rc<dyn Fn(A) -> R>>> = Rc::new(RefCell::new(Rc::new(f)));
        let cell = Rc::clone(&current);
        let stable = Callback::new(move |arg| {
            // release the borrow before calling so the callee may update us
            let f = Rc::clone(&cell.borrow());
            f(arg)
        });
        Self { current, stable }
    }

    /// Swap the target the stable callback forwards to.
    pub fn update(&self, f: impl Fn(A) -> R + 'static) {
        *self.current.borrow_mut() = Rc::new(f);
    }

    /// A handle that keeps its identity across updates.
    pub fn callback(&self) -> Callback<A, R> {
        self.stable.clone()
    }
}

/// Detects a value changing between observations.
///
/// The first value is recorded at construction and never reported.
#[derive(Debug, Clone)]
pub struct WhenChanged<T> {
    previous: T,
}

impl<T> WhenChanged<T> {
    /// Start watching from `initial`.
    pub fn new(initial: T) -> Self {
        Self { previous: initial }
    }

    /// Run `on_change` if `value` differs from the previous value.
    ///
    /// Returns whether it ran.
    pub fn observe(
        &mut self,
        value: T,
        is_equal: impl Fn(&T, &T) -> bool,
        on_change: impl FnOnce(&T),
    ) -> bool {
        if is_equal(&value, &self.previous) {
            return false;
        }
        on_change(&value);
        self.previous = value;
        true
    }

    /// Value seen at the last observation.
    pub fn previous(&self) -> &T {
        &self.previous
    }
}

impl<T: PartialEq> WhenChanged<T> {
    /// [`WhenChanged::observe`] with `PartialEq`.
    pub fn observe_eq(&mut self, value: T, on_change: impl FnOnce(&T)) -> bool {
        self.observe(value, |a, b| a == b, on_change)
    }
}

/// Where a [`OnceGuard`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    NotRun,
    /// Setup ran; its cleanup has not.
    Armed,
    CleanedUp,
}

enum GuardState {
    NotRun,
    Armed {
        cleanup: Unsubscribe,
        released: bool,
    },
    CleanedUp,
}

/// Runs setup once across a teardown that is immediately followed by a new
/// setup, while still cleaning up for real on the final teardown.
///
/// [`OnceGuard::release`] is the teardown that may be followed by a setup;
/// it only marks the cleanup as owed. A following [`OnceGuard::setup`]
/// forgives it. [`OnceGuard::settle`], [`OnceGuard::cleanup`] or dropping
/// the guard pays it.
pub struct OnceGuard {
    state: GuardState,
}

impl Default for OnceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OnceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceGuard")
            .field("phase", &self.phase())
            .field("released", &self.is_released())
            .finish()
    }
}

impl OnceGuard {
    /// A guard that has not run yet.
    pub fn new() -> Self {
        Self {
            state: GuardState::NotRun,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> GuardPhase {
        match self.state {
            GuardState::NotRun => GuardPhase::NotRun,
            GuardState::Armed { .. } => GuardPhase::Armed,
            GuardState::CleanedUp => GuardPhase::CleanedUp,
        }
    }

    /// Whether a cleanup is owed but has not run.
    pub fn is_released(&self) -> bool {
        matches!(self.state, GuardState::Armed { released: true, .. })
    }

    /// Run `f` unless a previous setup is still armed. Returns whether it ran.
    pub fn setup(&mut self, f: impl FnOnce() -> Unsubscribe) -> bool {
        match &mut self.state {
            GuardState::Armed { released, .. } => {
                *released = false;
                false
            }
            GuardState::NotRun | GuardState::CleanedUp => {
                let cleanup = f();
                self.state = GuardState::Armed {
                    cleanup,
                    released: false,
                };
                true
            }
        }
    }

    /// Teardown that may be undone by an immediate setup.
    pub fn release(&mut self) {
        if let GuardState::Armed { released, .. } = &mut self.state {
            *released = true;
        }
    }

    /// Run an owed cleanup if no setup forgave it.
    pub fn settle(&mut self) {
        if self.is_released() {
            self.cleanup();
        }
    }

    /// Final teardown; runs the cleanup now.
    pub fn cleanup(&mut self) {
        if let GuardState::Armed { mut cleanup, .. } =
            std::mem::replace(&mut self.state, GuardState::CleanedUp)
        {
            cleanup.call();
        }
    }
}

impl Drop for OnceGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Effect slot re-run whenever its dependencies change.
///
/// The previous run's cleanup always completes before the next setup.
pub struct Effect<D> {
    deps: Option<D>,
    guard: OnceGuard,
}

impl<D> Default for Effect<D> {
    fn default() -> Self {
        Self {
            deps: None,
            guard: OnceGuard::new(),
        }
    }
}

impl<D: fmt::Debug> fmt::Debug for Effect<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("deps", &self.deps)
            .field("guard", &self.guard)
            .finish()
    }
}

impl<D: PartialEq> Effect<D> {
    /// An effect that has not run yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `setup` if `deps` changed or nothing is armed. Returns whether
    /// setup ran.
    pub fn run(&mut self, deps: D, setup: impl FnOnce() -> Unsubscribe) -> bool {
        if self.deps.as_ref() != Some(&deps) {
            self.guard.cleanup();
            self.deps = Some(deps);
        }
        self.guard.setup(setup)
    }

    /// Teardown that an immediate [`Effect::run`] with the same
    /// dependencies will undo.
    pub fn suspend(&mut self) {
        self.guard.release();
    }

    /// Final teardown; runs any cleanup and forgets the dependencies.
    pub fn dispose(&mut self) {
        self.guard.cleanup();
        self.deps = None;
    }

    /// Phase of the underlying guard.
    pub fn phase(&self) -> GuardPhase {
        self.guard.phase()
    }

    /// Dependencies of the last setup that ran.
    pub fn deps(&self) -> Option<&D> {
        self.deps.as_ref()
    }
}

/// Local reactive state of a binding.
///
/// Snapshots are never patched: a newer one replaces the old one wholesale,
/// and only when it is not shallow-equal to it.
pub struct StateCell<T> {
    state: RefCell<Rc<T>>,
    stale: Cell<bool>,
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("state", &self.state.borrow())
            .field("stale", &self.stale.get())
            .finish()
    }
}

impl<T: ShallowEq> StateCell<T> {
    /// Hold `state`; not stale.
    pub fn new(state: T) -> Self {
        Self {
            state: RefCell::new(Rc::new(state)),
            stale: Cell::new(false),
        }
    }

    /// The current state, shared.
    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.state.borrow())
    }

    /// Swap in `state` without flagging a render.
    pub fn replace(&self, state: T) {
        *self.state.borrow_mut() = Rc::new(state);
    }

    /// Take `state` unless it is shallow-equal to the current snapshot.
    ///
    /// Returns whether it was taken; taking it flags a render.
    pub fn offer(&self, state: T) -> bool {
        if shallow_equal(Some(&**self.state.borrow()), Some(&state)) {
            return false;
        }
        self.replace(state);
        self.stale.set(true);
        true
    }

    /// Whether a change arrived since the last render.
    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    /// Mark or clear the pending re-render.
    pub fn set_stale(&self, stale: bool) {
        self.stale.set(stale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)))
    }

    fn counting_setup(setups: &Rc<Cell<u32>>, cleanups: &Rc<Cell<u32>>) -> Unsubscribe {
        setups.set(setups.get() + 1);
        let cleanups = cleanups.clone();
        Unsubscribe::new(move || cleanups.set(cleanups.get() + 1))
    }

    #[test]
    fn test_latest_reads_fresh_value() {
        let latest = Latest::new(1);
        let reader = latest.clone();
        let read = move || reader.get();
        latest.set(2);
        assert_eq!(read(), 2);
        assert_eq!(latest.with(|v| v * 10), 20);
    }

    #[test]
    fn test_constant_callback_keeps_identity() {
        let constant = ConstantCallback::new(|x: i32| x + 1);
        let first = constant.callback();
        assert_eq!(first.call(1), 2);

        constant.update(|x: i32| x * 100);
        let second = constant.callback();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.call(2), 200);
    }

    #[test]
    fn test_constant_callback_reentrant_update() {
        let constant = Rc::new(ConstantCallback::new(|_: ()| 1));
        let inner = constant.clone();
        constant.update(move |_: ()| {
            inner.update(|_: ()| 3);
            2
        });
        let cb = constant.callback();
        assert_eq!(cb.call(()), 2);
        assert_eq!(cb.call(()), 3);
    }

    #[test]
    fn test_when_changed_skips_initial() {
        let mut watcher = WhenChanged::new(1);
        let fired = Cell::new(0);
        assert!(!watcher.observe_eq(1, |_| fired.set(fired.get() + 1)));
        assert!(watcher.observe_eq(2, |v| fired.set(*v)));
        assert_eq!(fired.get(), 2);
        assert!(!watcher.observe_eq(2, |_| fired.set(99)));
        assert_eq!(*watcher.previous(), 2);
    }

    #[test]
    fn test_when_changed_custom_equality() {
        let mut watcher = WhenChanged::new("abc".to_string());
        let same_len = |a: &String, b: &String| a.len() == b.len();
        assert!(!watcher.observe("xyz".to_string(), same_len, |_| {}));
        assert!(watcher.observe("toolong".to_string(), same_len, |_| {}));
    }

    #[test]
    fn test_once_guard_double_invocation() {
        let (setups, cleanups) = counter();
        let mut guard = OnceGuard::new();
        assert_eq!(guard.phase(), GuardPhase::NotRun);

        assert!(guard.setup(|| counting_setup(&setups, &cleanups)));
        guard.release();
        assert!(!guard.setup(|| counting_setup(&setups, &cleanups)));
        guard.settle();
        assert_eq!((setups.get(), cleanups.get()), (1, 0));
        assert_eq!(guard.phase(), GuardPhase::Armed);

        guard.release();
        guard.settle();
        assert_eq!((setups.get(), cleanups.get()), (1, 1));
        assert_eq!(guard.phase(), GuardPhase::CleanedUp);
    }

    #[test]
    fn test_once_guard_cleans_up_on_drop() {
        let (setups, cleanups) = counter();
        {
            let mut guard = OnceGuard::new();
            guard.setup(|| counting_setup(&setups, &cleanups));
            guard.release();
        }
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_once_guard_setup_after_cleanup() {
        let (setups, cleanups) = counter();
        let mut guard = OnceGuard::new();
        guard.setup(|| counting_setup(&setups, &cleanups));
        guard.cleanup();
        guard.cleanup();
        assert!(guard.setup(|| counting_setup(&setups, &cleanups)));
        assert_eq!((setups.get(), cleanups.get()), (2, 1));
    }

    #[test]
    fn test_state_cell_gates_on_shallow_equality() {
        let cell = StateCell::new(serde_json::json!({"a": 1}));
        assert!(!cell.offer(serde_json::json!({"a": 1})));
        assert!(!cell.is_stale());
        assert!(cell.offer(serde_json::json!({"a": 2})));
        assert!(cell.is_stale());
        assert_eq!(cell.get()["a"], 2);
        cell.set_stale(false);
        cell.replace(serde_json::json!({"a": 3}));
        assert!(!cell.is_stale());
    }

    #[test]
    fn test_effect_reruns_on_deps_change() {
        let (setups, cleanups) = counter();
        let mut effect = Effect::new();
        assert!(effect.run("a", || counting_setup(&setups, &cleanups)));
        assert!(!effect.run("a", || counting_setup(&setups, &cleanups)));
        assert!(effect.run("b", || counting_setup(&setups, &cleanups)));
        assert_eq!((setups.get(), cleanups.get()), (2, 1));

        effect.suspend();
        assert!(!effect.run("b", || counting_setup(&setups, &cleanups)));
        assert_eq!(cleanups.get(), 1);

        effect.dispose();
        assert_eq!(cleanups.get(), 2);
        assert_eq!(effect.deps(), None);
    }
}
