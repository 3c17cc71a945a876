use crate::config::PreprocessorRule;
use crate::error::ConfigError;
use regex::Regex;
use std::borrow::Cow;

/// Compiled, ordered list of regex substitutions
///
/// Used to strip dynamic fragments (ids, timestamps, paths) out of messages
/// so that logically identical errors produce identical summaries.
#[derive(Debug, Clone, Default)]
pub struct SummaryPreprocessors {
    rules: Vec<(Regex, String)>,
}

impl SummaryPreprocessors {
    /// Compile the configured rules, preserving their order
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` for the first pattern that fails to compile.
    pub fn compile(rules: &[PreprocessorRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| (regex, rule.replacement.clone()))
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// Apply every substitution in order
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(text);
        for (regex, replacement) in &self.rules {
            let replaced = match regex.replace_all(&result, replacement.as_str()) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                result = Cow::Owned(replaced);
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_preprocessors_borrow() {
        let preprocessors = SummaryPreprocessors::default();
        assert!(matches!(preprocessors.apply("unchanged"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_rules_apply_in_order() {
        let preprocessors = SummaryPreprocessors::compile(&[
            PreprocessorRule::new(r"\d+", "N"),
            PreprocessorRule::new(r"user N", "user <id>"),
        ])
        .unwrap();

        assert_eq!(preprocessors.len(), 2);
        assert_eq!(
            preprocessors.apply("Lookup failed for user 1234 after 3 tries"),
            "Lookup failed for user <id> after N tries"
        );
    }

    #[test]
    fn test_capture_group_replacement() {
        let preprocessors = SummaryPreprocessors::compile(&[PreprocessorRule::new(
            r"in (\w+)\.php on line \d+",
            "in $1.php",
        )])
        .unwrap();

        assert_eq!(
            preprocessors.apply("Undefined index in Foo.php on line 42"),
            "Undefined index in Foo.php"
        );
    }

    #[test]
    fn test_invalid_pattern_reports_pattern() {
        let err = SummaryPreprocessors::compile(&[PreprocessorRule::new("(", "")]).unwrap_err();
        assert!(err.to_string().contains("'('"));
    }
}
