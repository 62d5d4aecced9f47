//! Context passing between bindings
//!
//! A [`Scope`] is one node of the binding tree. Values provided on a scope
//! are visible to every scope derived from it and to nothing else, so two
//! forms living side by side never see each other's engine.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::api::FormHandle;
use crate::error::{BindingError, BindingResult};
use crate::event::Platform;

struct ScopeNode {
    parent: Option<Rc<ScopeNode>>,
    values: HashMap<TypeId, Rc<dyn Any>>,
}

/// Immutable, cheaply cloned context node.
#[derive(Clone)]
pub struct Scope {
    node: Rc<ScopeNode>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut node = self.node.parent.as_ref();
        while let Some(parent) = node {
            depth += 1;
            node = parent.parent.as_ref();
        }
        f.debug_struct("Scope")
            .field("depth", &depth)
            .field("values", &self.node.values.len())
            .finish()
    }
}

impl Scope {
    /// An empty scope with no ancestors.
    pub fn root() -> Self {
        Self {
            node: Rc::new(ScopeNode {
                parent: None,
                values: HashMap::new(),
            }),
        }
    }

    /// Derive a child scope that additionally provides `value`.
    ///
    /// A value of the same type provided further up is shadowed for the
    /// child and its descendants only.
    pub fn provide<T: 'static>(&self, value: T) -> Scope {
        let mut values: HashMap<TypeId, Rc<dyn Any>> = HashMap::new();
        values.insert(TypeId::of::<T>(), Rc::new(value));
        Scope {
            node: Rc::new(ScopeNode {
                parent: Some(self.node.clone()),
                values,
            }),
        }
    }

    /// Nearest provided value of type `T`.
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        let mut node = Some(&self.node);
        while let Some(current) = node {
            if let Some(value) = current.values.get(&TypeId::of::<T>()) {
                return value.clone().downcast::<T>().ok();
            }
            node = current.parent.as_ref();
        }
        None
    }

    /// Platform the bindings are running on.
    pub fn platform(&self) -> Platform {
        self.get::<Platform>().map(|p| *p).unwrap_or_default()
    }
}

/// The engine published by a form binding to its descendants.
#[derive(Clone)]
pub struct FormContext(pub FormHandle);

impl fmt::Debug for FormContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FormContext").field(&"..").finish()
    }
}

/// Retrieve the enclosing form's engine.
///
/// `construct` names the caller in the error when no form is in scope.
pub fn use_form(scope: &Scope, construct: &'static str) -> BindingResult<FormHandle> {
    scope
        .get::<FormContext>()
        .map(|ctx| ctx.0.clone())
        .ok_or(BindingError::MissingForm { construct })
}
