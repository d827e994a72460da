use super::types::{ChangeValidator, Middleware};
use crate::error::{OrmError, OrmResult};
use crate::statement::StatementKind;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
#[cfg(feature = "validate")]
use std::sync::OnceLock;

type CustomCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A field rule checked against INSERT/UPDATE payloads.
#[derive(Clone)]
pub enum Rule {
    /// INSERT: the field must be present. Both kinds: it must not be NULL or an empty string.
    Required,
    /// Text is at most `n` characters (bytes for blobs).
    MaxLength(usize),
    #[cfg(feature = "validate")]
    Email,
    #[cfg(feature = "validate")]
    Url,
    #[cfg(feature = "validate")]
    Pattern(regex::Regex),
    Custom { name: String, check: CustomCheck },
}

impl Rule {
    /// Text must match `pattern`.
    #[cfg(feature = "validate")]
    pub fn pattern(pattern: &str) -> OrmResult<Self> {
        regex::Regex::new(pattern)
            .map(Rule::Pattern)
            .map_err(|e| OrmError::Config(format!("invalid validation pattern: {e}")))
    }

    /// Arbitrary check; `Err(msg)` fails validation with `msg`.
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Rule::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    fn check(&self, kind: StatementKind, value: Option<&Value>) -> Result<(), String> {
        if let Rule::Required = self {
            return match value {
                None if kind == StatementKind::Insert => Err("is required".into()),
                None => Ok(()),
                Some(Value::Null) => Err("must not be null".into()),
                Some(Value::Text(s)) if s.trim().is_empty() => Err("must not be empty".into()),
                Some(_) => Ok(()),
            };
        }
        // Absent and NULL values are left to `Required`.
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(());
        };
        match self {
            Rule::Required => Ok(()),
            Rule::MaxLength(max) => {
                let len = match value {
                    Value::Text(s) => s.chars().count(),
                    Value::Bytes(b) => b.len(),
                    _ => return Ok(()),
                };
                if len > *max {
                    Err(format!("must be at most {max} characters"))
                } else {
                    Ok(())
                }
            }
            #[cfg(feature = "validate")]
            Rule::Email => match value.as_str() {
                Some(s) if is_email(s) => Ok(()),
                _ => Err("must be a valid email address".into()),
            },
            #[cfg(feature = "validate")]
            Rule::Url => match value.as_str() {
                Some(s) if url::Url::parse(s).is_ok() => Ok(()),
                _ => Err("must be a valid URL".into()),
            },
            #[cfg(feature = "validate")]
            Rule::Pattern(re) => match value.as_str() {
                Some(s) if re.is_match(s) => Ok(()),
                _ => Err(format!("must match pattern {}", re.as_str())),
            },
            Rule::Custom { check, .. } => check(value),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("Required"),
            Rule::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            #[cfg(feature = "validate")]
            Rule::Email => f.write_str("Email"),
            #[cfg(feature = "validate")]
            Rule::Url => f.write_str("Url"),
            #[cfg(feature = "validate")]
            Rule::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Rule::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

#[cfg(feature = "validate")]
fn is_email(s: &str) -> bool {
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email regex")
        })
        .is_match(s)
}

/// Per-table field rules, checked before an INSERT or UPDATE is compiled.
///
/// All failures for one payload are reported together.
#[derive(Debug, Clone, Default)]
pub struct ValidationMiddleware {
    rules: BTreeMap<String, Vec<(String, Rule)>>,
}

impl ValidationMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `rule` to `table.field`.
    pub fn rule(mut self, table: impl Into<String>, field: impl Into<String>, rule: Rule) -> Self {
        self.rules
            .entry(table.into())
            .or_default()
            .push((field.into(), rule));
        self
    }

    pub fn required(self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.rule(table, field, Rule::Required)
    }

    pub fn max_length(self, table: impl Into<String>, field: impl Into<String>, max: usize) -> Self {
        self.rule(table, field, Rule::MaxLength(max))
    }

    #[cfg(feature = "validate")]
    pub fn email(self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.rule(table, field, Rule::Email)
    }

    #[cfg(feature = "validate")]
    pub fn url(self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.rule(table, field, Rule::Url)
    }

    pub fn rules_for(&self, table: &str) -> &[(String, Rule)] {
        self.rules.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &str {
        "validation"
    }

    fn as_validator(&self) -> Option<&dyn ChangeValidator> {
        Some(self)
    }
}

impl ChangeValidator for ValidationMiddleware {
    fn validate(&self, kind: StatementKind, table: &str, changes: &[(String, Value)]) -> OrmResult<()> {
        if !matches!(kind, StatementKind::Insert | StatementKind::Update) {
            return Ok(());
        }
        let failures: Vec<String> = self
            .rules_for(table)
            .iter()
            .filter_map(|(field, rule)| {
                let value = changes.iter().find(|(name, _)| name == field).map(|(_, v)| v);
                rule.check(kind, value)
                    .err()
                    .map(|msg| format!("{table}.{field} {msg}"))
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrmError::validation(failures.join("; ")))
        }
    }
}
