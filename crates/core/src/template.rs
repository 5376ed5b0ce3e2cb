//! Text template engine for the status line
//!
//! Templates are plain text with actions between a configurable pair of
//! delimiters (`<` and `>` by default):
//!
//! ```text
//! <.Battery.percent>% <stringify .Mpd.song.Title> <printf "%.1f" .Sys.load>
//! ```
//!
//! An action is a field path (`.Name.field.0`, `.` for the whole snapshot),
//! a literal, `stringify <arg>` or `printf "<format>" <args...>`. Keys are
//! matched exactly first and case-insensitively second, so `.Bat.Percent`
//! finds a receiver value serialized as `percent`.

use crate::error::{RenderError, TemplateError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rg_pipe_types::Snapshot;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Splits an action into string literals and bare words
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|\S+"#).expect("Invalid regex"));

/// printf directives: flags, width, precision, verb
static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%([-0]?)(\d*)(?:\.(\d+))?([svdf%])").expect("Invalid regex"));

/// Action delimiters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delims {
    pub left: String,
    pub right: String,
}

impl Delims {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl Default for Delims {
    fn default() -> Self {
        Self::new("<", ">")
    }
}

/// Something that can turn the current snapshot into output text
///
/// The aggregator is the only caller and calls it once per change.
pub trait Render {
    fn render(&self, data: &Snapshot) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    /// Field path; empty means the whole snapshot
    Field(Vec<String>),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Print(Arg),
    Stringify(Arg),
    Printf { format: String, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Action(Action),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source` using the given delimiters
    ///
    /// A trailing newline is added when the source does not end with one,
    /// so every render produces exactly one complete line (or more).
    pub fn parse(source: &str, delims: &Delims) -> Result<Self, TemplateError> {
        if delims.left.is_empty() || delims.right.is_empty() {
            return Err(TemplateError::EmptyDelims);
        }

        let mut nodes = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(&delims.left) {
            if start > 0 {
                nodes.push(Node::Text(rest[..start].to_string()));
            }
            let body_start = start + delims.left.len();
            let end = rest[body_start..]
                .find(&delims.right)
                .ok_or(TemplateError::Unclosed(offset + start))?;
            let body = rest[body_start..body_start + end].trim();
            if body.is_empty() {
                return Err(TemplateError::EmptyAction(offset + start));
            }
            nodes.push(Node::Action(parse_action(body)?));

            let consumed = body_start + end + delims.right.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        let mut tail = rest.to_string();
        if !source.ends_with('\n') {
            tail.push('\n');
        }
        nodes.push(Node::Text(tail));

        Ok(Self { nodes })
    }
}

impl Render for Template {
    fn render(&self, data: &Snapshot) -> Result<String, RenderError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(Action::Print(arg)) => {
                    out.push_str(&display(eval(arg, data)?.as_ref()))
                }
                Node::Action(Action::Stringify(arg)) => {
                    if let Value::String(s) = eval(arg, data)?.as_ref() {
                        out.push_str(s);
                    }
                }
                Node::Action(Action::Printf { format, args }) => {
                    let values = args
                        .iter()
                        .map(|arg| eval(arg, data))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.push_str(&printf(format, &values)?);
                }
            }
        }
        Ok(out)
    }
}

fn parse_action(body: &str) -> Result<Action, TemplateError> {
    let tokens: Vec<&str> = TOKEN_RE.find_iter(body).map(|m| m.as_str()).collect();
    let (head, rest) = match tokens.split_first() {
        Some(split) => split,
        None => return Err(TemplateError::BadArgument(body.to_string())),
    };

    match *head {
        "stringify" => {
            if rest.len() != 1 {
                return Err(TemplateError::Arity {
                    func: "stringify".to_string(),
                    expected: "1".to_string(),
                    got: rest.len(),
                });
            }
            Ok(Action::Stringify(parse_arg(rest[0], body)?))
        }
        "printf" => {
            let (format, args) = match rest.split_first() {
                Some(split) => split,
                None => {
                    return Err(TemplateError::Arity {
                        func: "printf".to_string(),
                        expected: "at least 1".to_string(),
                        got: 0,
                    })
                }
            };
            let format = match parse_arg(format, body)? {
                Arg::Literal(Value::String(format)) => format,
                _ => return Err(TemplateError::BadArgument(format.to_string())),
            };
            let args = args
                .iter()
                .map(|token| parse_arg(token, body))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Action::Printf { format, args })
        }
        _ if rest.is_empty() => Ok(Action::Print(parse_arg(head, body)?)),
        word if word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            Err(TemplateError::UnknownFunction(word.to_string()))
        }
        _ => Err(TemplateError::BadArgument(body.to_string())),
    }
}

fn parse_arg(token: &str, body: &str) -> Result<Arg, TemplateError> {
    if token == "." {
        return Ok(Arg::Field(Vec::new()));
    }
    if let Some(path) = token.strip_prefix('.') {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TemplateError::BadArgument(token.to_string()));
        }
        return Ok(Arg::Field(segments));
    }
    if token.starts_with('"') {
        return serde_json::from_str::<String>(token)
            .map(|s| Arg::Literal(Value::String(s)))
            .map_err(|_| TemplateError::UnterminatedString(body.to_string()));
    }
    match serde_json::from_str::<Value>(token) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => Ok(Arg::Literal(value)),
        _ => Err(TemplateError::BadArgument(token.to_string())),
    }
}

/// Look up a key, exact match first
fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn eval<'a>(arg: &'a Arg, data: &'a Snapshot) -> Result<Cow<'a, Value>, RenderError> {
    let path = match arg {
        Arg::Literal(value) => return Ok(Cow::Borrowed(value)),
        Arg::Field(path) => path,
    };
    let missing = || RenderError::MissingField(format!(".{}", path.join(".")));

    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => {
            let all: Map<String, Value> =
                data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            return Ok(Cow::Owned(Value::Object(all)));
        }
    };

    let mut current = data.get(first.as_str()).or_else(|| {
        data.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(first))
            .map(|(_, v)| v)
    });
    for segment in rest {
        current = match current {
            Some(Value::Object(map)) => lookup(map, segment),
            Some(Value::Array(items)) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
    }
    current.map(Cow::Borrowed).ok_or_else(missing)
}

/// Default text form of a value
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "<no value>".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{:.0}", f)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn pad(text: String, flags: &str, width: usize, numeric: bool) -> String {
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let fill = width - len;
    match flags {
        "-" => format!("{}{}", text, " ".repeat(fill)),
        "0" if numeric => match text.strip_prefix('-') {
            Some(digits) => format!("-{}{}", "0".repeat(fill), digits),
            None => format!("{}{}", "0".repeat(fill), text),
        },
        _ => format!("{}{}", " ".repeat(fill), text),
    }
}

fn printf(format: &str, args: &[Cow<'_, Value>]) -> Result<String, RenderError> {
    let mut next = 0;
    let mut failure = None;

    let out = DIRECTIVE_RE.replace_all(format, |caps: &Captures| {
        let verb = &caps[4];
        if verb == "%" {
            return "%".to_string();
        }
        let Some(arg) = args.get(next) else {
            failure.get_or_insert_with(|| format!("missing argument for %{}", verb));
            return String::new();
        };
        next += 1;

        let flags = &caps[1];
        let width = caps[2].parse::<usize>().unwrap_or(0);
        let precision = caps.get(3).and_then(|m| m.as_str().parse::<usize>().ok());

        let (text, numeric) = match verb {
            "d" => match arg.as_i64().or_else(|| {
                arg.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            }) {
                Some(i) => (i.to_string(), true),
                None => {
                    failure.get_or_insert_with(|| format!("%d of non-integer {}", arg));
                    return String::new();
                }
            },
            "f" => match arg.as_f64() {
                Some(f) => (format!("{:.*}", precision.unwrap_or(6), f), true),
                None => {
                    failure.get_or_insert_with(|| format!("%f of non-number {}", arg));
                    return String::new();
                }
            },
            _ => {
                let mut text = display(arg);
                if let Some(precision) = precision {
                    text = text.chars().take(precision).collect();
                }
                (text, false)
            }
        };
        pad(text, flags, width, numeric)
    });

    if let Some(message) = failure {
        return Err(RenderError::Format(message));
    }
    if next < args.len() {
        return Err(RenderError::Format(format!(
            "{} extra argument(s)",
            args.len() - next
        )));
    }
    Ok(out.into_owned())
}
