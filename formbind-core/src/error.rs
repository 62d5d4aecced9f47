//! Usage errors raised by the bindings

use thiserror::Error;

/// A broken component tree.
///
/// These are programmer mistakes, not runtime conditions: a binding that
/// cannot find its form, or has nothing to render with, cannot produce a
/// meaningful view. Engine-reported problems (validation and submission
/// errors) are never surfaced through this type; they travel as ordinary
/// state values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("{construct} must be used inside of a Form component")]
    MissingForm { construct: &'static str },

    #[error(
        "Must specify either a render prop, a render function as children, or a component prop to {construct}"
    )]
    NoRenderer { construct: &'static str },

    #[error("{construct} requires a non-empty name")]
    MissingName { construct: &'static str },
}

/// Result of a binding operation.
pub type BindingResult<T> = Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_construct() {
        let err = BindingError::MissingForm { construct: "Field" };
        assert_eq!(err.to_string(), "Field must be used inside of a Form component");

        let err = BindingError::NoRenderer {
            construct: "FormSpy",
        };
        assert!(err.to_string().ends_with("to FormSpy"));
    }
}
