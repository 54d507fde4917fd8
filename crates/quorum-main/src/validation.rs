// Validation state for one view.
// Handshake results and witness reachability, both default false.

use std::collections::HashMap;
use thiserror::Error;
use crate::membership::MemberName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} does not appear in the potential quorum member set")]
    UnknownMember(MemberName),

    #[error("{0} does not appear in the view")]
    NotInView(MemberName),
}

#[derive(Debug, Default, Clone)]
pub struct MemberStates {
    validated: HashMap<MemberName, bool>,
    reachable: HashMap<MemberName, bool>,
}

impl MemberStates {
    pub fn new() -> Self {
        Self {
            validated: HashMap::new(),
            reachable: HashMap::new(),
        }
    }

    // Admission is checked by the caller, which owns the member sets.
    pub fn set_validated(&mut self, name: &str, value: bool) {
        self.validated.insert(name.to_string(), value);
    }

    pub fn is_validated(&self, name: &str) -> bool {
        self.validated.get(name).copied().unwrap_or(false)
    }

    pub fn set_reachable(&mut self, name: &str, value: bool) {
        self.reachable.insert(name.to_string(), value);
    }

    pub fn is_reachable(&self, name: &str) -> bool {
        self.reachable.get(name).copied().unwrap_or(false)
    }

    /// Number of names in `names` with a positive validation.
    pub fn count_validated<'a, I>(&self, names: I) -> usize
        where I: IntoIterator<Item = &'a MemberName>
    {
        names.into_iter().filter(|name| self.is_validated(name)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_false() {
        let states = MemberStates::new();
        assert!(!states.is_validated("a"));
        assert!(!states.is_reachable("a"));
    }

    #[test]
    fn test_retraction_overwrites() {
        let mut states = MemberStates::new();
        states.set_validated("a", true);
        assert!(states.is_validated("a"));
        states.set_validated("a", false);
        assert!(!states.is_validated("a"));
    }

    #[test]
    fn test_count_validated() {
        let mut states = MemberStates::new();
        states.set_validated("a", true);
        states.set_validated("b", false);
        states.set_reachable("c", true);

        let names: Vec<MemberName> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(states.count_validated(&names), 1);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::UnknownMember("x".into()).to_string(),
            "x does not appear in the potential quorum member set"
        );
        assert_eq!(ValidationError::NotInView("x".into()).to_string(), "x does not appear in the view");
    }
}
