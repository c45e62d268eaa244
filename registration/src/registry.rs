//! The static allow-list of campaign codes.
//!
//! Loaded once at startup and never modified afterwards.

use crate::types::RegistrationCode;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading the code registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The codes file could not be read
    #[error("Failed to read codes file {}: {source}", path.display())]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A line is not an 8-character alphanumeric code
    #[error("Malformed code on line {line}: {content:?}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// Offending line, trimmed
        content: String,
    },

    /// The file holds no codes at all
    #[error("Codes file contains no codes")]
    Empty,
}

/// Read-only set of valid redemption codes
#[derive(Debug, Clone, Default)]
pub struct CodeRegistry {
    codes: HashSet<RegistrationCode>,
}

impl CodeRegistry {
    /// Build a registry from already-parsed codes
    #[must_use]
    pub fn from_codes<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = RegistrationCode>,
    {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    /// Parse registry contents: one code per line
    ///
    /// Blank lines and lines starting with `#` are skipped. Duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Malformed`] for the first bad line, or
    /// [`RegistryError::Empty`] if no code was found.
    pub fn parse(contents: &str) -> Result<Self, RegistryError> {
        let mut codes = HashSet::new();

        for (index, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let code = RegistrationCode::parse(trimmed).ok_or_else(|| RegistryError::Malformed {
                line: index + 1,
                content: trimmed.to_string(),
            })?;
            codes.insert(code);
        }

        if codes.is_empty() {
            return Err(RegistryError::Empty);
        }

        Ok(Self { codes })
    }

    /// Load the registry from a file
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the file cannot be read, or any error
    /// from [`CodeRegistry::parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let registry = Self::parse(&contents)?;
        tracing::info!(path = %path.display(), codes = registry.len(), "Code registry loaded");
        Ok(registry)
    }

    /// Resolve user input to a registered code
    ///
    /// Input is trimmed first; anything that is not a registered code yields `None`.
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<RegistrationCode> {
        RegistrationCode::parse(text).filter(|code| self.codes.contains(code))
    }

    /// Whether `text` (trimmed) is a registered code
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.lookup(text).is_some()
    }

    /// Number of registered codes
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let registry = CodeRegistry::parse("# batch 1\nAB12CD34\n\n  ZZ99YY88  \n# end\n").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("AB12CD34"));
        assert!(registry.contains(" ZZ99YY88 "));
    }

    #[test]
    fn parse_reports_line_of_malformed_code() {
        let err = CodeRegistry::parse("AB12CD34\nSHORT\n").unwrap_err();
        match err {
            RegistryError::Malformed { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "SHORT");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_rejects_empty_file() {
        assert!(matches!(
            CodeRegistry::parse("# nothing yet\n"),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn load_missing_file_names_the_path() {
        let err = CodeRegistry::load("/definitely/not/here/codes.txt").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here/codes.txt"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = CodeRegistry::from_codes(RegistrationCode::parse("AB12CD34"));
        assert!(registry.lookup("ab12cd34").is_none());
    }

    fn code_strategy() -> impl Strategy<Value = String> {
        "[A-Z0-9]{8}"
    }

    proptest! {
        #[test]
        fn registered_codes_are_found_with_surrounding_whitespace(
            code in code_strategy(),
            left in "[ \t]{0,3}",
            right in "[ \t\n]{0,3}",
        ) {
            let registry = CodeRegistry::from_codes(RegistrationCode::parse(&code));
            let input = format!("{left}{code}{right}");
            prop_assert_eq!(registry.lookup(&input).map(|c| c.to_string()), Some(code));
        }

        #[test]
        fn text_of_other_lengths_is_never_a_code(text in "[A-Z0-9]{0,7}|[A-Z0-9]{9,12}") {
            let registry = CodeRegistry::from_codes(RegistrationCode::parse("AB12CD34"));
            prop_assert!(!registry.contains(&text));
        }
    }
}
