//! formbind: Subscription-driven bindings between UI components and a form-state engine
//!
//! A [`Form`] owns an engine, [`Field`]s register against it, and a
//! [`FormSpy`] watches it. Each binding re-renders only when the slice of
//! state it subscribed to changes.
//!
//! # Example
//! ```ignore
//! use formbind::prelude::*;
//! use formbind::testing::MemoryForm;
//!
//! let form = Form::new::<MemoryForm>(
//!     &Scope::root(),
//!     FormProps::new().render(|props: &FormRenderProps| props.state.submitting),
//! );
//! let field = Field::new(
//!     form.scope(),
//!     FieldProps::new("email")
//!         .subscription(FieldSubscription::VALUE | FieldSubscription::ERROR)
//!         .render(|props: &FieldRenderProps| props.meta.error().cloned()),
//! )?;
//! ```

// Re-export everything from core
pub use formbind_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Engine
    pub use formbind_core::{
        FieldState, FormApi, FormConfig, FormEngine, FormHandle, FormState, Submission,
        Unsubscribe,
    };

    // Bindings
    pub use formbind_core::{
        Field, FieldInput, FieldMeta, FieldProps, FieldRenderProps, Form, FormProps,
        FormRenderProps, FormSpy, FormSpyProps, FormSpyRenderProps, ResetArg,
    };

    // Scope and events
    pub use formbind_core::{
        BindingError, BindingResult, ChangeEvent, Component, ControlType, EventTarget,
        FormContext, InputEvent, Scope, UiEvent, Values,
    };

    // Subscriptions
    pub use formbind_core::{FieldSubscription, FormSubscription};
}
