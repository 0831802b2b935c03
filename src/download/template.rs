//! Placeholder substitution for destination path templates.
//!
//! Syntax:
//! - `{name}` substitutes a field
//! - `{name.sub}` reaches into a composite field (`start`/`end` of a time
//!   interval, the bound names of a range such as `wavemin`)
//! - `{name:fmt}` formats a time field with a strftime pattern
//! - `{{` and `}}` are literal braces

use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use super::error::PathError;
use crate::query::RangeValue;
use crate::time::TimeRange;

const DEFAULT_INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value a placeholder can resolve to.
#[derive(Debug, Clone)]
pub enum TemplateValue<'a> {
    /// Plain text.
    Text(Cow<'a, str>),
    /// A point in time.
    Instant(DateTime<Utc>),
    /// A time interval.
    Interval(TimeRange),
    /// A numeric range with named bounds.
    Range(&'a RangeValue),
}

/// Renders `template`, resolving each placeholder through `lookup`.
///
/// # Errors
///
/// - [`PathError::MissingTemplateField`] if `lookup` does not know a field or
///   a `.sub` part does not exist on it.
/// - [`PathError::InvalidTemplate`] for unbalanced braces, empty placeholders,
///   bad strftime patterns, or a format spec on a non-time field.
pub fn render_template<'a, F>(template: &str, lookup: F) -> Result<String, PathError>
where
    F: Fn(&str) -> Option<TemplateValue<'a>>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(PathError::invalid_template(template, "unmatched '}'")),
            '{' => {
                let mut placeholder = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(PathError::invalid_template(
                                template,
                                "nested '{' inside a placeholder",
                            ));
                        }
                        c => placeholder.push(c),
                    }
                }
                if !closed {
                    return Err(PathError::invalid_template(template, "unclosed '{'"));
                }
                let rendered = render_placeholder(template, &placeholder, &lookup)?;
                out.push_str(&rendered);
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Returns true if `template` has an unescaped placeholder for `field`.
///
/// `{field}`, `{field.sub}` and `{field:fmt}` all count; `{{field}}` does not.
pub(crate) fn references_field(template: &str, field: &str) -> bool {
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
            }
            '{' => {
                let placeholder: String = chars.by_ref().take_while(|&c| c != '}').collect();
                let path = placeholder.split(':').next().unwrap_or_default();
                if path.split('.').next() == Some(field) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn render_placeholder<'a, F>(
    template: &str,
    placeholder: &str,
    lookup: &F,
) -> Result<String, PathError>
where
    F: Fn(&str) -> Option<TemplateValue<'a>>,
{
    let (path, spec) = match placeholder.split_once(':') {
        Some((path, spec)) => (path, Some(spec)),
        None => (placeholder, None),
    };
    if path.is_empty() {
        return Err(PathError::invalid_template(template, "empty placeholder"));
    }
    let (name, sub) = match path.split_once('.') {
        Some((name, sub)) => (name, Some(sub)),
        None => (path, None),
    };

    let value = lookup(name).ok_or_else(|| PathError::missing_field(name, template))?;
    let value = match sub {
        None => value,
        Some(sub) => {
            descend(value, sub).ok_or_else(|| PathError::missing_field(path, template))?
        }
    };

    match (value, spec) {
        (TemplateValue::Text(text), None) => Ok(text.into_owned()),
        (TemplateValue::Range(range), None) => Ok(format!("{}-{}", range.min, range.max)),
        (TemplateValue::Instant(at), spec) => {
            format_instant(template, at, spec.unwrap_or(DEFAULT_INSTANT_FORMAT))
        }
        (TemplateValue::Interval(range), None) => Ok(range.to_string()),
        (TemplateValue::Interval(range), Some(spec)) => Ok(format!(
            "{}-{}",
            format_instant(template, range.start(), spec)?,
            format_instant(template, range.end(), spec)?
        )),
        (TemplateValue::Text(_) | TemplateValue::Range(_), Some(_)) => {
            Err(PathError::invalid_template(
                template,
                format!("'{name}' is not a time field and takes no format"),
            ))
        }
    }
}

fn descend<'a>(value: TemplateValue<'a>, sub: &str) -> Option<TemplateValue<'a>> {
    match value {
        TemplateValue::Interval(range) => match sub {
            "start" => Some(TemplateValue::Instant(range.start())),
            "end" => Some(TemplateValue::Instant(range.end())),
            _ => None,
        },
        TemplateValue::Range(range) => range
            .field(sub)
            .map(|bound| TemplateValue::Text(Cow::Owned(bound.to_string()))),
        TemplateValue::Text(_) | TemplateValue::Instant(_) => None,
    }
}

fn format_instant(template: &str, at: DateTime<Utc>, spec: &str) -> Result<String, PathError> {
    if StrftimeItems::new(spec).any(|item| matches!(item, Item::Error)) {
        return Err(PathError::invalid_template(
            template,
            format!("invalid time format '{spec}'"),
        ));
    }
    let mut out = String::new();
    write!(out, "{}", at.format(spec)).map_err(|_| {
        PathError::invalid_template(template, format!("invalid time format '{spec}'"))
    })?;
    Ok(out)
}
