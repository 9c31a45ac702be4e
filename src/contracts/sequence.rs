use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contracts::error::CodecError;
use crate::numeral::NumeralSystem;

/// Backend-assigned identifier of a stored sequence definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceId(pub u64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable shape of a sequence, supplied when it is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceConfig {
    pub alphabet: String,
    pub pad_char: char,
    pub width: usize,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl SequenceConfig {
    /// Creates a config with no prefix or suffix.
    pub fn new(alphabet: impl Into<String>, pad_char: char, width: usize) -> Self {
        Self {
            alphabet: alphabet.into(),
            pad_char,
            width,
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Builds the numeral system described by this config.
    pub fn numeral_system(&self) -> Result<NumeralSystem, CodecError> {
        NumeralSystem::new(&self.alphabet, self.pad_char, self.width)
    }
}

/// One persisted sequence: its configuration plus the raw current value.
///
/// The serialized field names follow the logical record schema
/// (`name`, `alphabet`, `padChar`, `width`, `prefix`, `suffix`, `currentValue`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDefinition {
    pub name: String,
    pub alphabet: String,
    pub pad_char: char,
    pub width: usize,
    pub prefix: String,
    pub suffix: String,
    /// Numeral portion only; never includes prefix or suffix.
    pub current_value: String,
}

impl SequenceDefinition {
    pub fn new(name: impl Into<String>, config: SequenceConfig, current_value: String) -> Self {
        Self {
            name: name.into(),
            alphabet: config.alphabet,
            pad_char: config.pad_char,
            width: config.width,
            prefix: config.prefix,
            suffix: config.suffix,
            current_value,
        }
    }

    pub fn config(&self) -> SequenceConfig {
        SequenceConfig {
            alphabet: self.alphabet.clone(),
            pad_char: self.pad_char,
            width: self.width,
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
        }
    }

    pub fn numeral_system(&self) -> Result<NumeralSystem, CodecError> {
        NumeralSystem::new(&self.alphabet, self.pad_char, self.width)
    }

    /// Wraps a raw value in this sequence's prefix and suffix.
    pub fn decorate(&self, raw: &str) -> String {
        let mut out = String::with_capacity(self.prefix.len() + raw.len() + self.suffix.len());
        out.push_str(&self.prefix);
        out.push_str(raw);
        out.push_str(&self.suffix);
        out
    }
}
