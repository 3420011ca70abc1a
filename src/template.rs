//! A small text template language for overlay files.
//!
//! Templates are literal text with `{{ expression }}` placeholders. An
//! expression is a dotted path, optionally piped through filters:
//!
//! ```text
//! Raised so far: {{ state.total | fixed(2) }} EUR
//! Top supporter: {{ state.top.name | default("nobody yet") | upper }}
//! ```
//!
//! Paths starting with `state.` resolve against the state document; any
//! other path resolves against it too, so `{{ total }}` works as well.
//! `{{{{` produces a literal `{{`.

use crate::path;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("unterminated `{{{{` at byte {offset}")]
    Unterminated { offset: usize },

    #[error("empty expression at byte {offset}")]
    EmptyExpression { offset: usize },

    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    #[error("filter `{filter}` has an invalid argument `{arg}`")]
    InvalidArgument { filter: String, arg: String },

    #[error("`{path}` is not set")]
    Missing { path: String },

    #[error("filter `{filter}` expects a number, got {value}")]
    NotANumber { filter: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Fixed(usize),
    Default(Value),
    Upper,
    Lower,
}

#[derive(Debug, Clone, PartialEq)]
struct Expr {
    path: String,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Expr(Expr),
}

/// A compiled template.
///
/// # Examples
///
/// ```
/// use alertfold::Template;
/// use serde_json::json;
///
/// let template = Template::compile("Total: {{ state.total | fixed(2) }}").unwrap();
/// assert_eq!(template.render(&json!({"total": 12.5})).unwrap(), "Total: 12.50");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            let offset = source.len() - rest.len() + start;
            text.push_str(&rest[..start]);

            if rest[start..].starts_with("{{{{") {
                text.push_str("{{");
                rest = &rest[start + 4..];
                continue;
            }

            let inner = &rest[start + 2..];
            let end = inner
                .find("}}")
                .ok_or(TemplateError::Unterminated { offset })?;

            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Expr(parse_expr(&inner[..end], offset)?));
            rest = &inner[end + 2..];
        }

        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Template { segments })
    }

    /// Render against a state document.
    pub fn render(&self, state: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&expr.evaluate(state)?),
            }
        }
        Ok(out)
    }
}

fn parse_expr(source: &str, offset: usize) -> Result<Expr, TemplateError> {
    let mut parts = source.split('|').map(str::trim);
    let path = parts.next().unwrap_or_default();
    if path.is_empty() {
        return Err(TemplateError::EmptyExpression { offset });
    }

    let filters = parts.map(parse_filter).collect::<Result<Vec<_>, _>>()?;
    Ok(Expr {
        path: path.to_string(),
        filters,
    })
}

fn parse_filter(source: &str) -> Result<Filter, TemplateError> {
    let (name, arg) = match source.split_once('(') {
        Some((name, rest)) => {
            let arg = rest.strip_suffix(')').ok_or_else(|| TemplateError::InvalidArgument {
                filter: name.trim().to_string(),
                arg: rest.to_string(),
            })?;
            (name.trim(), Some(arg.trim()))
        }
        None => (source, None),
    };

    let invalid = |arg: &str| TemplateError::InvalidArgument {
        filter: name.to_string(),
        arg: arg.to_string(),
    };

    match (name, arg) {
        ("fixed", Some(arg)) => arg.parse().map(Filter::Fixed).map_err(|_| invalid(arg)),
        ("default", Some(arg)) => Ok(Filter::Default(
            serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string())),
        )),
        ("upper", None) => Ok(Filter::Upper),
        ("lower", None) => Ok(Filter::Lower),
        ("fixed" | "default", None) => Err(invalid("")),
        ("upper" | "lower", Some(arg)) => Err(invalid(arg)),
        (other, _) => Err(TemplateError::UnknownFilter(other.to_string())),
    }
}

impl Expr {
    fn lookup<'a>(&self, state: &'a Value) -> Option<&'a Value> {
        match self.path.as_str() {
            "state" => Some(state),
            p => path::get(state, p.strip_prefix("state.").unwrap_or(p)),
        }
    }

    fn evaluate(&self, state: &Value) -> Result<String, TemplateError> {
        let mut value = self.lookup(state).filter(|v| !v.is_null()).cloned();

        for filter in &self.filters {
            value = match (filter, value) {
                (Filter::Default(fallback), None) => Some(fallback.clone()),
                (_, None) => None,
                (Filter::Default(_), Some(v)) => Some(v),
                (Filter::Fixed(places), Some(v)) => {
                    let n = as_number(&v).ok_or_else(|| TemplateError::NotANumber {
                        filter: "fixed",
                        value: v.to_string(),
                    })?;
                    Some(Value::String(format!("{:.*}", *places, n)))
                }
                (Filter::Upper, Some(v)) => Some(Value::String(display(&v).to_uppercase())),
                (Filter::Lower, Some(v)) => Some(Value::String(display(&v).to_lowercase())),
            };
        }

        value.map(|v| display(&v)).ok_or_else(|| TemplateError::Missing {
            path: self.path.clone(),
        })
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Remove the indentation shared by every non-blank line.
///
/// # Examples
///
/// ```
/// use alertfold::template::strip_indent;
///
/// assert_eq!(strip_indent("    a\n      b\n    c"), "a\n  b\nc");
/// ```
pub fn strip_indent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    if indent == 0 {
        return text.to_string();
    }

    text.split('\n')
        .map(|line| {
            let leading = line.len() - line.trim_start_matches([' ', '\t']).len();
            &line[leading.min(indent)..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}
