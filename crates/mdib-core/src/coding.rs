//! Coded values and the normalized [`Coding`] key used for lookups.

use serde::{Deserialize, Serialize};

/// Implied coding system when a coded value carries none (ISO/IEEE 11073-10101).
pub const DEFAULT_CODING_SYSTEM: &str = "urn:oid:1.2.840.10004.1.1.1.0.0.1";

/// Normalized comparison key of a code: the coding system is always explicit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coding {
    pub code: String,
    pub coding_system: String,
    pub coding_system_version: Option<String>,
}

impl Coding {
    /// A code in the default nomenclature.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            coding_system: DEFAULT_CODING_SYSTEM.to_string(),
            coding_system_version: None,
        }
    }

    pub fn with_system(code: impl Into<String>, coding_system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            coding_system: coding_system.into(),
            coding_system_version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.coding_system_version = Some(version.into());
        self
    }

    /// Index key form, e.g. `"12345@urn:oid:...@"`.
    pub fn index_key(&self) -> String {
        format!(
            "{}@{}@{}",
            self.code,
            self.coding_system,
            self.coding_system_version.as_deref().unwrap_or("")
        )
    }
}

impl std::fmt::Display for Coding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.coding_system_version {
            Some(v) => write!(f, "{} ({} v{})", self.code, self.coding_system, v),
            None => write!(f, "{} ({})", self.code, self.coding_system),
        }
    }
}

/// Alternative code for the same concept in another coding system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub code: String,
    pub coding_system: Option<String>,
}

impl Translation {
    fn matches(&self, coding: &Coding) -> bool {
        self.code == coding.code
            && self.coding_system.as_deref().unwrap_or(DEFAULT_CODING_SYSTEM)
                == coding.coding_system
    }
}

/// A code as it appears in a descriptor's `Type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedValue {
    pub code: String,
    coding_system: Option<String>,
    pub coding_system_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<Translation>,
}

impl CodedValue {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            coding_system: None,
            coding_system_version: None,
            translations: Vec::new(),
        }
    }

    pub fn with_coding_system(mut self, coding_system: impl Into<String>) -> Self {
        self.coding_system = Some(coding_system.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.coding_system_version = Some(version.into());
        self
    }

    pub fn with_translation(mut self, code: impl Into<String>, coding_system: Option<String>) -> Self {
        self.translations.push(Translation {
            code: code.into(),
            coding_system,
        });
        self
    }

    /// The coding system as written, `None` when it was left implied.
    pub fn coding_system(&self) -> Option<&str> {
        self.coding_system.as_deref()
    }

    /// The coding system with the implied default applied.
    pub fn effective_coding_system(&self) -> &str {
        self.coding_system.as_deref().unwrap_or(DEFAULT_CODING_SYSTEM)
    }

    pub fn coding(&self) -> Coding {
        Coding {
            code: self.code.clone(),
            coding_system: self.effective_coding_system().to_string(),
            coding_system_version: self.coding_system_version.clone(),
        }
    }

    /// True if the value itself or one of its translations denotes `coding`.
    pub fn is_equivalent(&self, coding: &Coding) -> bool {
        if self.code == coding.code
            && self.effective_coding_system() == coding.coding_system
            && self.coding_system_version == coding.coding_system_version
        {
            return true;
        }
        self.translations.iter().any(|t| t.matches(coding))
    }
}

impl From<&CodedValue> for Coding {
    fn from(value: &CodedValue) -> Self {
        value.coding()
    }
}
