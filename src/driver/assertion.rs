//! Expected-vs-actual checks
//!
//! Checks are made once against the value fetched at call time. Nothing
//! here waits for the UI to settle; order steps so the previous action has
//! taken effect, or locate with a timeout first.

use crate::common::{Error, Result};
use crate::webdriver::Remote;

use super::locator::ElementHandle;
use super::session::Session;

/// What to compare the observed value against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Exact text
    Equals(String),
    /// Text contains a substring
    Contains(String),
    /// Element is (or is not) rendered in the viewport
    Visible(bool),
}

impl Matcher {
    fn describe(&self) -> String {
        match self {
            Self::Equals(s) => format!("{:?}", s),
            Self::Contains(s) => format!("text containing {:?}", s),
            Self::Visible(true) => "visible".to_string(),
            Self::Visible(false) => "not visible".to_string(),
        }
    }
}

/// A value read from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Text(String),
    Visibility(bool),
}

impl std::fmt::Display for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Visibility(true) => write!(f, "visible"),
            Self::Visibility(false) => write!(f, "not visible"),
        }
    }
}

/// A named check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// What is being checked, usually the locator
    pub subject: String,
    pub matcher: Matcher,
}

impl Assertion {
    pub fn new(subject: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            subject: subject.into(),
            matcher,
        }
    }

    /// Compare an observed value against the matcher
    pub fn check(&self, observed: &Observed) -> Result<()> {
        let passed = match (&self.matcher, observed) {
            (Matcher::Equals(expected), Observed::Text(actual)) => actual == expected,
            (Matcher::Contains(expected), Observed::Text(actual)) => actual.contains(expected.as_str()),
            (Matcher::Visible(expected), Observed::Visibility(actual)) => actual == expected,
            _ => false,
        };

        if passed {
            Ok(())
        } else {
            Err(Error::assertion_failed(
                &self.subject,
                &self.matcher.describe(),
                &observed.to_string(),
            ))
        }
    }

    /// Fetch the value this matcher needs and check it
    pub async fn verify(&self, remote: &dyn Remote, session: &Session, handle: &ElementHandle) -> Result<()> {
        let observed = observe(remote, session, handle, &self.matcher).await?;
        tracing::debug!("{}: observed {}", self.subject, observed);
        self.check(&observed)
    }
}

/// Read the element state a matcher compares against
pub async fn observe(
    remote: &dyn Remote,
    session: &Session,
    handle: &ElementHandle,
    matcher: &Matcher,
) -> Result<Observed> {
    handle.ensure_usable(session)?;
    match matcher {
        Matcher::Equals(_) | Matcher::Contains(_) => remote
            .element_text(session.id(), handle.element_id())
            .await
            .map(Observed::Text),
        Matcher::Visible(_) => remote
            .element_displayed(session.id(), handle.element_id())
            .await
            .map(Observed::Visibility),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Observed {
        Observed::Text(s.to_string())
    }

    #[test]
    fn test_equals_same_value_passes() {
        for value in ["", "Morgan Freeman", "•••", "End of screen"] {
            Assertion::new("~x", Matcher::Equals(value.to_string()))
                .check(&text(value))
                .unwrap();
        }
    }

    #[test]
    fn test_equals_mismatch_reports_both_values() {
        let err = Assertion::new("~switch-text", Matcher::Equals("Click to turn the switch OFF".to_string()))
            .check(&text("Click to turn the switch ON"))
            .unwrap_err();

        match &err {
            Error::AssertionFailed {
                subject,
                expected,
                actual,
            } => {
                assert_eq!(subject, "~switch-text");
                assert!(expected.contains("switch OFF"));
                assert!(actual.contains("switch ON"));
            }
            other => panic!("Expected AssertionFailed, got {:?}", other),
        }
        assert!(err.is_assertion());
    }

    #[test]
    fn test_contains() {
        let a = Assertion::new("~switch-text", Matcher::Contains("switch".to_string()));
        a.check(&text("Click to turn the switch ON")).unwrap();
        assert!(a.check(&text("General info")).is_err());
    }

    #[test]
    fn test_visible() {
        let visible = Assertion::new("~endscreen", Matcher::Visible(true));
        visible.check(&Observed::Visibility(true)).unwrap();
        let err = visible.check(&Observed::Visibility(false)).unwrap_err();
        assert!(err.to_string().contains("not visible"));

        Assertion::new("~loading", Matcher::Visible(false))
            .check(&Observed::Visibility(false))
            .unwrap();
    }

    #[test]
    fn test_kind_mismatch_fails() {
        assert!(Assertion::new("~x", Matcher::Visible(true))
            .check(&text("visible"))
            .is_err());
    }
}
