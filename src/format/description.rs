use crate::config::{LoggerOptions, SessionVars};
use crate::error::ConfigError;
use crate::events::{Context, ErrorEvent, Severity, Timestamp, EXCEPTION_KEY};
use crate::format::SummaryPreprocessors;
use chrono::SecondsFormat;
use serde_json::Value;

/// Number of characters kept from a message when building a summary
///
/// The tracker limits names to 150 characters; quoting the summary for a
/// search and the ellipsis need the rest.
pub const SUMMARY_MAX_CHARS: usize = 145;

/// Marker appended to truncated summaries
pub const ELLIPSIS: &str = "...";

/// Environment variable name fragments whose values are never dumped
const SENSITIVE_NAME_PARTS: &[&str] = &[
    "TOKEN",
    "SECRET",
    "PASSWORD",
    "PASSWD",
    "KEY",
    "CREDENTIAL",
    "AUTH",
    "COOKIE",
];

/// Builds ticket summaries and descriptions from log events
pub trait DescriptionFormatter: Send {
    /// One-line fingerprint of the event, used as ticket name and search key
    fn summary(&self, severity: Severity, message: &str) -> String;

    /// Full ticket body for a newly created ticket
    fn description(&self, event: &ErrorEvent, logged_at: Timestamp) -> String;
}

/// Plain-text formatter driven by [`LoggerOptions`]
#[derive(Debug, Clone)]
pub struct StringFormatter {
    preprocessors: SummaryPreprocessors,
    line_break: String,
    include_server_dump: bool,
    session_vars: SessionVars,
    exception_whitelist: Vec<String>,
}

impl StringFormatter {
    /// Create a formatter from logger options
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if a summary preprocessor does not compile.
    pub fn from_options(options: &LoggerOptions) -> Result<Self, ConfigError> {
        Ok(Self {
            preprocessors: SummaryPreprocessors::compile(&options.summary_preprocessors)?,
            line_break: options.line_break.clone(),
            include_server_dump: options.include_server_dump,
            session_vars: options.include_session_vars.clone(),
            exception_whitelist: options.exception_methods_to_call_white_list.clone(),
        })
    }

    fn context_lines(&self, context: &Context, lines: &mut Vec<String>) {
        let entries: Vec<(&String, &Value)> = context
            .iter()
            .filter(|(key, value)| !(key.as_str() == EXCEPTION_KEY && value.is_object()))
            .collect();

        if entries.is_empty() {
            return;
        }

        lines.push(String::new());
        lines.push("Context:".to_string());
        for (key, value) in entries {
            lines.push(format!("{}: {}", key, render_value(value)));
        }
    }

    /// Render only the whitelisted fields of a captured error
    fn exception_lines(&self, context: &Context, lines: &mut Vec<String>) {
        let Some(Value::Object(details)) = context.get(EXCEPTION_KEY) else {
            return;
        };

        let fields: Vec<(&String, &Value)> = self
            .exception_whitelist
            .iter()
            .filter_map(|name| details.get(name.as_str()).map(|value| (name, value)))
            .collect();

        if fields.is_empty() {
            return;
        }

        lines.push(String::new());
        lines.push("Exception:".to_string());
        for (name, value) in fields {
            lines.push(format!("{}: {}", name, render_value(value)));
        }
    }

    fn server_lines(&self, lines: &mut Vec<String>) {
        if !self.include_server_dump {
            return;
        }

        lines.push(String::new());
        lines.push("Server:".to_string());
        for (name, value) in server_snapshot() {
            lines.push(format!("{}: {}", name, value));
        }
    }

    fn session_lines(&self, session: Option<&Context>, lines: &mut Vec<String>) {
        let Some(session) = session else {
            return;
        };

        let entries: Vec<(&String, &Value)> = match &self.session_vars {
            SessionVars::None => return,
            SessionVars::All => session.iter().collect(),
            SessionVars::Keys(keys) => keys
                .iter()
                .filter_map(|key| session.get(key.as_str()).map(|value| (key, value)))
                .collect(),
        };

        if entries.is_empty() {
            return;
        }

        lines.push(String::new());
        lines.push("Session:".to_string());
        for (key, value) in entries {
            lines.push(format!("{}: {}", key, render_value(value)));
        }
    }
}

impl DescriptionFormatter for StringFormatter {
    fn summary(&self, severity: Severity, message: &str) -> String {
        let cleaned = self.preprocessors.apply(message);
        let one_line = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

        if one_line.is_empty() {
            return format!("{}: (empty message)", severity);
        }

        truncate_summary(&one_line)
    }

    fn description(&self, event: &ErrorEvent, logged_at: Timestamp) -> String {
        let mut lines = vec![
            format!("Severity: {}", event.severity),
            format!("Message: {}", event.message),
            format!(
                "Logged at: {}",
                logged_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        ];

        self.context_lines(&event.context, &mut lines);
        self.exception_lines(&event.context, &mut lines);
        self.server_lines(&mut lines);
        self.session_lines(event.session.as_ref(), &mut lines);

        let text = lines.join("\n").replace("\r\n", "\n");
        self.preprocessors
            .apply(&text)
            .replace('\n', &self.line_break)
    }
}

/// Cut a summary to [`SUMMARY_MAX_CHARS`] characters, marking the cut with [`ELLIPSIS`]
pub fn truncate_summary(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Wrap a summary in double quotes for an exact-phrase search
pub fn search_string(summary: &str) -> String {
    format!("\"{}\"", summary)
}

/// Strings are rendered raw, string lists one per line, everything else as pretty JSON
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) && !items.is_empty() => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Process details and environment variables, sensitive values masked
fn server_snapshot() -> Vec<(String, String)> {
    let mut snapshot = vec![("process_id".to_string(), std::process::id().to_string())];

    if let Ok(exe) = std::env::current_exe() {
        snapshot.push(("executable".to_string(), exe.display().to_string()));
    }
    if let Ok(cwd) = std::env::current_dir() {
        snapshot.push(("working_directory".to_string(), cwd.display().to_string()));
    }

    let mut vars: Vec<(String, String)> = std::env::vars_os()
        .map(|(name, value)| {
            let name = name.to_string_lossy().into_owned();
            let value = if is_sensitive_name(&name) {
                "***".to_string()
            } else {
                value.to_string_lossy().into_owned()
            };
            (name, value)
        })
        .collect();
    vars.sort();

    snapshot.extend(vars);
    snapshot
}

fn is_sensitive_name(name: &str) -> bool {
    let upper = name.to_uppercase();
    SENSITIVE_NAME_PARTS.iter().any(|part| upper.contains(part))
}
