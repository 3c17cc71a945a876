use crate::error::ConfigError;
use crate::format::SummaryPreprocessors;
use serde::{Deserialize, Serialize};

/// Options controlling how log events become tickets
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggerOptions {
    /// Project that new tickets are entered into
    pub project_id: u64,
    /// Project searched for existing tickets, 0 searches all projects
    pub project_id_to_check_for_issues: u64,
    /// Status names treated as closed; tickets in these get a new ticket instead of a comment
    pub enter_issue_if_not_status: Vec<String>,
    /// Kind of item created on the tracker
    pub item_type: ItemType,
    /// Release attached to new tickets, if any
    pub release_id: Option<u64>,
    /// Seconds before the same summary may be submitted again
    pub try_resubmit_timeout: u64,
    /// Include a dump of the process environment in descriptions
    pub include_server_dump: bool,
    /// Which session entries to include in descriptions
    ///
    /// WARNING: session data may contain secrets.
    pub include_session_vars: SessionVars,
    /// Regex substitutions applied to summaries and descriptions
    pub summary_preprocessors: Vec<PreprocessorRule>,
    /// Token used to join description lines
    pub line_break: String,
    /// Fields of a captured error that may be rendered
    pub exception_methods_to_call_white_list: Vec<String>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            project_id: 0,
            project_id_to_check_for_issues: 0,
            enter_issue_if_not_status: vec!["Closed".to_string()],
            item_type: ItemType::Defect,
            release_id: None,
            try_resubmit_timeout: 5,
            include_server_dump: false,
            include_session_vars: SessionVars::None,
            summary_preprocessors: Vec::new(),
            line_break: "<br/>".to_string(),
            exception_methods_to_call_white_list: ["message", "file", "line", "sources", "trace"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl LoggerOptions {
    /// Check option values for consistency
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for an empty line break and
    /// `ConfigError::InvalidPattern` for a preprocessor that does not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line_break.is_empty() {
            return Err(ConfigError::ValidationError(
                "line_break must not be empty".to_string(),
            ));
        }

        if self
            .enter_issue_if_not_status
            .iter()
            .any(|status| status.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "enter_issue_if_not_status must not contain empty names".to_string(),
            ));
        }

        SummaryPreprocessors::compile(&self.summary_preprocessors)?;
        Ok(())
    }

    /// Whether a ticket in the given status counts as closed
    pub fn is_closed_status(&self, status: &str) -> bool {
        self.enter_issue_if_not_status.iter().any(|s| s == status)
    }
}

/// Kinds of tracker items that can be created
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    #[serde(alias = "defects")]
    Defect,
    #[serde(alias = "features")]
    Feature,
    #[serde(alias = "tasks")]
    Task,
    #[serde(alias = "incidents")]
    Incident,
}

impl ItemType {
    /// API collection name for this item type
    pub fn endpoint(&self) -> &'static str {
        match self {
            ItemType::Defect => "defects",
            ItemType::Feature => "features",
            ItemType::Task => "tasks",
            ItemType::Incident => "incidents",
        }
    }
}

/// Policy for embedding session data into descriptions
///
/// Accepts `false`, a list of keys, or `"ALL"` in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawSessionVars")]
pub enum SessionVars {
    #[default]
    None,
    Keys(Vec<String>),
    All,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSessionVars {
    Flag(bool),
    Keys(Vec<String>),
    Keyword(String),
}

impl TryFrom<RawSessionVars> for SessionVars {
    type Error = String;

    fn try_from(raw: RawSessionVars) -> Result<Self, Self::Error> {
        match raw {
            RawSessionVars::Flag(false) => Ok(SessionVars::None),
            RawSessionVars::Flag(true) => Err(
                "include_session_vars = true is ambiguous, use \"ALL\" or a list of keys"
                    .to_string(),
            ),
            RawSessionVars::Keys(keys) => Ok(SessionVars::Keys(keys)),
            RawSessionVars::Keyword(word) if word.eq_ignore_ascii_case("all") => {
                Ok(SessionVars::All)
            }
            RawSessionVars::Keyword(word) => Err(format!(
                "include_session_vars must be false, a list of keys or \"ALL\", got \"{}\"",
                word
            )),
        }
    }
}

/// One pattern-to-replacement substitution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreprocessorRule {
    /// Regular expression to search for
    pub pattern: String,
    /// Replacement text, `$1`-style group references allowed
    pub replacement: String,
}

impl PreprocessorRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        include_session_vars: SessionVars,
    }

    fn parse_session(value: &str) -> Result<SessionVars, toml::de::Error> {
        toml::from_str::<Wrapper>(&format!("include_session_vars = {}", value))
            .map(|w| w.include_session_vars)
    }

    #[test]
    fn test_defaults() {
        let options = LoggerOptions::default();
        assert_eq!(options.item_type, ItemType::Defect);
        assert_eq!(options.try_resubmit_timeout, 5);
        assert_eq!(options.enter_issue_if_not_status, vec!["Closed"]);
        assert_eq!(options.release_id, None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_session_vars_forms() {
        assert_eq!(parse_session("false").unwrap(), SessionVars::None);
        assert_eq!(parse_session("\"ALL\"").unwrap(), SessionVars::All);
        assert_eq!(
            parse_session("[\"user_id\", \"locale\"]").unwrap(),
            SessionVars::Keys(vec!["user_id".to_string(), "locale".to_string()])
        );
        assert!(parse_session("true").is_err());
        assert!(parse_session("\"some\"").is_err());
    }

    #[test]
    fn test_item_type_endpoint_and_aliases() {
        assert_eq!(ItemType::Defect.endpoint(), "defects");
        assert_eq!(ItemType::Incident.endpoint(), "incidents");

        let parsed: ItemType = serde_json::from_str("\"features\"").unwrap();
        assert_eq!(parsed, ItemType::Feature);
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let options = LoggerOptions {
            summary_preprocessors: vec![PreprocessorRule::new("(unclosed", "x")],
            ..LoggerOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_line_break() {
        let options = LoggerOptions {
            line_break: String::new(),
            ..LoggerOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_is_closed_status_is_exact() {
        let options = LoggerOptions {
            enter_issue_if_not_status: vec!["Closed".to_string(), "Resolved".to_string()],
            ..LoggerOptions::default()
        };
        assert!(options.is_closed_status("Resolved"));
        assert!(!options.is_closed_status("closed"));
        assert!(!options.is_closed_status("Open"));
    }
}
