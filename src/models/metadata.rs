//! Test identity and traits
//!
//! The information a container exposes about the test it holds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, optionally valued tag attached to a test
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestTrait {
    pub name: String,
    pub value: Option<String>,
}

impl TestTrait {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// A trait that is present but carries no value
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

impl fmt::Display for TestTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Identity of a test plus the traits that apply to it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMetadata {
    pub name: String,
    #[serde(default)]
    pub traits: Vec<TestTrait>,
}

impl TestMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: Vec::new(),
        }
    }

    pub fn with_trait(mut self, test_trait: TestTrait) -> Self {
        self.traits.push(test_trait);
        self
    }

    /// Value of the first trait with the given name.
    ///
    /// A missing trait and a trait without a value both yield `None`.
    pub fn trait_value(&self, name: &str) -> Option<&str> {
        self.traits
            .iter()
            .find(|t| t.name == name)
            .and_then(|t| t.value.as_deref())
    }
}
