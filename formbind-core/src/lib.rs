//! Core traits and types for formbind
//!
//! This crate binds UI components to an external form-state engine. The
//! engine owns values, validation, and submission; the bindings here keep a
//! component in sync with just the slice of engine state it subscribed to.
//!
//! # Core Concepts
//!
//! - **FormApi**: The engine contract every binding talks to
//! - **Form**: Owns an engine and publishes it to descendants through a [`Scope`]
//! - **Field**: Registers one named field and renders its input and meta state
//! - **FormSpy**: Observes form state, rendering it or reporting it through a callback
//! - **Subscriptions**: Bit sets selecting which state keys cause a re-render
//!
//! # Host Protocol
//!
//! Bindings are driven by the host in render and commit phases:
//!
//! 1. Construct and render parents before children
//! 2. Commit children before their parent
//! 3. Re-render a binding whenever `needs_render()` reports true
//! 4. `suspend()` followed by `commit()` leaves registrations untouched
//! 5. Dropping (or `unmount()`) a binding is final
//!
//! # Basic Example
//!
//! ```ignore
//! use formbind_core::prelude::*;
//! use formbind_core::testing::MemoryForm;
//!
//! let mut form = Form::new::<MemoryForm>(
//!     &Scope::root(),
//!     FormProps::new()
//!         .on_submit(|values: &Values, _: &dyn FormApi| {
//!             println!("{values:?}");
//!             None
//!         })
//!         .render(|_: &FormRenderProps| ()),
//! );
//! let mut first = Field::new(
//!     form.scope(),
//!     FieldProps::new("firstName").render(|p: &FieldRenderProps| p.input.value()),
//! )?;
//! form.render()?;
//! first.render()?;
//! first.commit();
//! form.commit();
//!
//! first.render_props().input.change(json!("erik"));
//! form.handle_submit(None);
//! ```

pub mod api;
pub mod context;
pub mod error;
pub mod event;
pub mod field;
pub mod form;
pub mod hooks;
pub mod path;
pub mod render;
pub mod shallow;
pub mod spy;
pub mod subscription;
pub mod testing;
pub mod value;

// Engine contract
pub use api::{
    AfterSubmit, BeforeSubmit, ConfigUpdate, DebugHook, FieldConfig, FieldListener, FieldState,
    FieldValidator, FormApi, FormConfig, FormEngine, FormHandle, FormListener, FormState, IsEqual,
    Mutator, Mutators, RecordValidator, Submission, SubmitHandler, Unsubscribe, ValidatorGetter,
};

// Bindings
pub use field::{Field, FieldInput, FieldMeta, FieldPhase, FieldProps, FieldRenderProps};
pub use form::{Decorator, Form, FormProps, FormRenderProps, ResetArg, ValuesEqual};
pub use spy::{FormSpy, FormSpyProps, FormSpyRenderProps, SpyListener};

// Plumbing
pub use context::{use_form, FormContext, Scope};
pub use error::{BindingError, BindingResult};
pub use event::{
    ChangeEvent, ControlType, EventTarget, InputEvent, Platform, SelectOption, UiEvent,
};
pub use path::{get_in, set_in, to_path, Values};
pub use render::{render_with, Component, RenderStrategy, Renderer};
pub use shallow::{shallow_equal, ShallowEq};
pub use subscription::{
    diff_subscription, flatten_subscription, FieldSubscription, FormSubscription,
    SubscriptionKeys,
};
pub use value::{default_format, default_parse, get_value, Format, Parse};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::api::{
        FieldState, FormApi, FormConfig, FormEngine, FormHandle, FormState, Submission,
        Unsubscribe,
    };
    pub use crate::context::{FormContext, Scope};
    pub use crate::error::{BindingError, BindingResult};
    pub use crate::event::{ChangeEvent, ControlType, EventTarget, InputEvent, UiEvent};
    pub use crate::field::{Field, FieldInput, FieldMeta, FieldProps, FieldRenderProps};
    pub use crate::form::{Form, FormProps, FormRenderProps, ResetArg};
    pub use crate::path::Values;
    pub use crate::render::Component;
    pub use crate::spy::{FormSpy, FormSpyProps, FormSpyRenderProps};
    pub use crate::subscription::{FieldSubscription, FormSubscription};
}
