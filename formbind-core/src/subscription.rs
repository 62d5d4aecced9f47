//! Subscription sets and the helpers that compare them
//!
//! A subscription declares which state attributes a binding cares about.
//! Attributes outside the set must never cause that binding to re-render.
//! `None` means "unspecified", which every binding resolves to the full set.

use bitflags::bitflags;

bitflags! {
    /// Field-state attributes a field binding can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldSubscription: u32 {
        const ACTIVE = 1 << 0;
        const DATA = 1 << 1;
        const DIRTY = 1 << 2;
        const DIRTY_SINCE_LAST_SUBMIT = 1 << 3;
        const ERROR = 1 << 4;
        const INITIAL = 1 << 5;
        const INVALID = 1 << 6;
        const LENGTH = 1 << 7;
        const MODIFIED = 1 << 8;
        const MODIFIED_SINCE_LAST_SUBMIT = 1 << 9;
        const PRISTINE = 1 << 10;
        const SUBMIT_ERROR = 1 << 11;
        const SUBMIT_FAILED = 1 << 12;
        const SUBMIT_SUCCEEDED = 1 << 13;
        const SUBMITTING = 1 << 14;
        const TOUCHED = 1 << 15;
        const VALID = 1 << 16;
        const VALIDATING = 1 << 17;
        const VALUE = 1 << 18;
        const VISITED = 1 << 19;
    }
}

bitflags! {
    /// Form-state attributes a form binding or spy can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormSubscription: u32 {
        const ACTIVE = 1 << 0;
        const DIRTY = 1 << 1;
        const DIRTY_FIELDS = 1 << 2;
        const DIRTY_FIELDS_SINCE_LAST_SUBMIT = 1 << 3;
        const DIRTY_SINCE_LAST_SUBMIT = 1 << 4;
        const ERROR = 1 << 5;
        const ERRORS = 1 << 6;
        const HAS_SUBMIT_ERRORS = 1 << 7;
        const HAS_VALIDATION_ERRORS = 1 << 8;
        const INITIAL_VALUES = 1 << 9;
        const INVALID = 1 << 10;
        const MODIFIED = 1 << 11;
        const MODIFIED_SINCE_LAST_SUBMIT = 1 << 12;
        const PRISTINE = 1 << 13;
        const SUBMIT_ERROR = 1 << 14;
        const SUBMIT_ERRORS = 1 << 15;
        const SUBMIT_FAILED = 1 << 16;
        const SUBMIT_SUCCEEDED = 1 << 17;
        const SUBMITTING = 1 << 18;
        const TOUCHED = 1 << 19;
        const VALID = 1 << 20;
        const VALIDATING = 1 << 21;
        const VALUES = 1 << 22;
        const VISITED = 1 << 23;
    }
}

/// The named vocabulary behind a subscription set.
pub trait SubscriptionKeys: Copy + 'static {
    /// Every single-key flag with its attribute name.
    const KEYS: &'static [(Self, &'static str)];

    fn has(self, key: Self) -> bool;

    fn is_none(self) -> bool;

    /// Names of the keys present in this set, in vocabulary order.
    fn key_names(self) -> impl Iterator<Item = &'static str> {
        Self::KEYS
            .iter()
            .filter(move |(flag, _)| self.has(*flag))
            .map(|(_, name)| *name)
    }

    /// Look up a single key by its attribute name.
    fn from_key(name: &str) -> Option<Self> {
        Self::KEYS
            .iter()
            .find(|(_, key)| *key == name)
            .map(|(flag, _)| *flag)
    }
}

macro_rules! subscription_keys {
    ($ty:ident { $($flag:ident => $name:literal),+ $(,)? }) => {
        impl SubscriptionKeys for $ty {
            const KEYS: &'static [(Self, &'static str)] = &[$(($ty::$flag, $name)),+];

            fn has(self, key: Self) -> bool {
                self.contains(key)
            }

            fn is_none(self) -> bool {
                self.is_empty()
            }
        }
    };
}

subscription_keys!(FieldSubscription {
    ACTIVE => "active",
    DATA => "data",
    DIRTY => "dirty",
    DIRTY_SINCE_LAST_SUBMIT => "dirtySinceLastSubmit",
    ERROR => "error",
    INITIAL => "initial",
    INVALID => "invalid",
    LENGTH => "length",
    MODIFIED => "modified",
    MODIFIED_SINCE_LAST_SUBMIT => "modifiedSinceLastSubmit",
    PRISTINE => "pristine",
    SUBMIT_ERROR => "submitError",
    SUBMIT_FAILED => "submitFailed",
    SUBMIT_SUCCEEDED => "submitSucceeded",
    SUBMITTING => "submitting",
    TOUCHED => "touched",
    VALID => "valid",
    VALIDATING => "validating",
    VALUE => "value",
    VISITED => "visited",
});

subscription_keys!(FormSubscription {
    ACTIVE => "active",
    DIRTY => "dirty",
    DIRTY_FIELDS => "dirtyFields",
    DIRTY_FIELDS_SINCE_LAST_SUBMIT => "dirtyFieldsSinceLastSubmit",
    DIRTY_SINCE_LAST_SUBMIT => "dirtySinceLastSubmit",
    ERROR => "error",
    ERRORS => "errors",
    HAS_SUBMIT_ERRORS => "hasSubmitErrors",
    HAS_VALIDATION_ERRORS => "hasValidationErrors",
    INITIAL_VALUES => "initialValues",
    INVALID => "invalid",
    MODIFIED => "modified",
    MODIFIED_SINCE_LAST_SUBMIT => "modifiedSinceLastSubmit",
    PRISTINE => "pristine",
    SUBMIT_ERROR => "submitError",
    SUBMIT_ERRORS => "submitErrors",
    SUBMIT_FAILED => "submitFailed",
    SUBMIT_SUCCEEDED => "submitSucceeded",
    SUBMITTING => "submitting",
    TOUCHED => "touched",
    VALID => "valid",
    VALIDATING => "validating",
    VALUES => "values",
    VISITED => "visited",
});

/// Whether two subscriptions disagree on any of the `known` keys.
///
/// A defined, non-empty set never matches an unspecified one.
pub fn diff_subscription<F: SubscriptionKeys>(a: Option<F>, b: Option<F>, known: F) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => F::KEYS
            .iter()
            .any(|(key, _)| known.has(*key) && a.has(*key) != b.has(*key)),
        (Some(set), None) | (None, Some(set)) => !set.is_none(),
        (None, None) => false,
    }
}

/// Flatten a subscription into a stable dependency key.
///
/// Two sets with the same meaning always flatten to the same string, no
/// matter how they were built.
pub fn flatten_subscription<F: SubscriptionKeys>(set: Option<F>) -> String {
    let Some(set) = set else {
        return String::new();
    };
    let mut names: Vec<&'static str> = set.key_names().collect();
    names.sort_unstable();
    names.join(",")
}
