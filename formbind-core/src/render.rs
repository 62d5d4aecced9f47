//! Render delegation shared by every binding
//!
//! A binding hands its computed props to exactly one renderer. Three
//! strategies are supported and resolved by [`render_with`] in priority order:
//! component, then render function, then children function.

use std::fmt;
use std::rc::Rc;

use crate::error::{BindingError, BindingResult};

/// A reusable view unit receiving binding props.
pub trait Component<P, V> {
    fn render(&self, props: &P) -> V;
}

impl<P, V, F> Component<P, V> for F
where
    F: Fn(&P) -> V,
{
    fn render(&self, props: &P) -> V {
        self(props)
    }
}

/// The resolved rendering strategy.
pub enum Renderer<P, V> {
    Component(Rc<dyn Component<P, V>>),
    Render(Rc<dyn Fn(&P) -> V>),
    Children(Rc<dyn Fn(&P) -> V>),
}

impl<P, V> Clone for Renderer<P, V> {
    fn clone(&self) -> Self {
        match self {
            Renderer::Component(c) => Renderer::Component(Rc::clone(c)),
            Renderer::Render(f) => Renderer::Render(Rc::clone(f)),
            Renderer::Children(f) => Renderer::Children(Rc::clone(f)),
        }
    }
}

impl<P, V> fmt::Debug for Renderer<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Renderer::Component(_) => "Component",
            Renderer::Render(_) => "Render",
            Renderer::Children(_) => "Children",
        };
        f.debug_tuple("Renderer").field(&kind).finish()
    }
}

impl<P, V> Renderer<P, V> {
    /// Render `props`.
    pub fn call(&self, props: &P) -> V {
        match self {
            Renderer::Component(component) => component.render(props),
            Renderer::Render(f) | Renderer::Children(f) => f(props),
        }
    }
}

/// The three optional renderer slots a binding accepts.
pub struct RenderStrategy<P, V> {
    pub component: Option<Rc<dyn Component<P, V>>>,
    pub render: Option<Rc<dyn Fn(&P) -> V>>,
    pub children: Option<Rc<dyn Fn(&P) -> V>>,
}

impl<P, V> Default for RenderStrategy<P, V> {
    fn default() -> Self {
        Self {
            component: None,
            render: None,
            children: None,
        }
    }
}

impl<P, V> Clone for RenderStrategy<P, V> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            render: self.render.clone(),
            children: self.children.clone(),
        }
    }
}

impl<P, V> fmt::Debug for RenderStrategy<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderStrategy")
            .field("component", &self.component.is_some())
            .field("render", &self.render.is_some())
            .field("children", &self.children.is_some())
            .finish()
    }
}

impl<P, V> RenderStrategy<P, V> {
    /// Render through a component.
    pub fn component(component: impl Component<P, V> + 'static) -> Self {
        Self {
            component: Some(Rc::new(component)),
            ..Self::default()
        }
    }

    /// Render through a function.
    pub fn render(f: impl Fn(&P) -> V + 'static) -> Self {
        Self {
            render: Some(Rc::new(f)),
            ..Self::default()
        }
    }

    /// Render through a children function.
    pub fn children(f: impl Fn(&P) -> V + 'static) -> Self {
        Self {
            children: Some(Rc::new(f)),
            ..Self::default()
        }
    }

    /// Whether no renderer was given.
    pub fn is_empty(&self) -> bool {
        self.component.is_none() && self.render.is_none() && self.children.is_none()
    }

    /// Pick the renderer to use; `construct` names the caller on failure.
    pub fn resolve(&self, construct: &'static str) -> BindingResult<Renderer<P, V>> {
        if let Some(component) = &self.component {
            return Ok(Renderer::Component(Rc::clone(component)));
        }
        if let Some(render) = &self.render {
            return Ok(Renderer::Render(Rc::clone(render)));
        }
        if let Some(children) = &self.children {
            return Ok(Renderer::Children(Rc::clone(children)));
        }
        Err(BindingError::NoRenderer { construct })
    }
}

/// Render `props` with whichever strategy `strategy` resolves to.
pub fn render_with<P, V>(
    strategy: &RenderStrategy<P, V>,
    props: &P,
    construct: &'static str,
) -> BindingResult<V> {
    Ok(strategy.resolve(construct)?.call(props))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Label;

    impl Component<u32, String> for Label {
        fn render(&self, props: &u32) -> String {
            format!("component {props}")
        }
    }

    #[test]
    fn test_priority_component_render_children() {
        let mut strategy = RenderStrategy::children(|p: &u32| format!("children {p}"));
        assert_eq!(render_with(&strategy, &1, "Field").as_deref(), Ok("children 1"));

        strategy.render = Some(Rc::new(|p: &u32| format!("render {p}")));
        assert_eq!(render_with(&strategy, &2, "Field").as_deref(), Ok("render 2"));

        strategy.component = Some(Rc::new(Label));
        assert_eq!(render_with(&strategy, &3, "Field").as_deref(), Ok("component 3"));
    }

    #[test]
    fn test_closures_are_components() {
        let strategy = RenderStrategy::component(|p: &u32| p * 2);
        assert_eq!(render_with(&strategy, &21, "Form"), Ok(42));
    }

    #[test]
    fn test_missing_renderer_names_construct() {
        let strategy: RenderStrategy<u32, u32> = RenderStrategy::default();
        assert!(strategy.is_empty());
        assert_eq!(
            render_with(&strategy, &0, "FormSpy"),
            Err(BindingError::NoRenderer {
                construct: "FormSpy"
            })
        );
    }
}
