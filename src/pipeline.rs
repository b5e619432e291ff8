//! Pipeline Evaluator - runs parsed expressions and substitutes tags in text
//!
//! Segments run left to right. Each filter sees the previous segment's value
//! as its piped input. Missing variables never fail, they evaluate to null.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::context::{value_to_string, Context};
use crate::error::ParseError;
use crate::expression::{Argument, Expression, Segment};
use crate::filters::FilterRegistry;

/// `{...}` whose content does not start with `/`
pub fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^/}][^}]*)\}").expect("valid tag pattern"))
}

/// Evaluates an expression to its final value.
///
/// Returns `None` for an expression without segments.
pub fn evaluate(
    expression: &Expression,
    context: &Context,
    filters: &FilterRegistry,
) -> Result<Option<Value>, ParseError> {
    let mut accumulator: Option<Value> = None;

    for segment in &expression.segments {
        let value = match segment {
            Segment::Variable(path) => context.resolve(path),
            Segment::Literal(text) => Value::String(text.clone()),
            Segment::Call { filter, arguments } => {
                let implementation = filters
                    .get(filter)
                    .ok_or_else(|| ParseError::UnknownFilter(filter.clone()))?;
                let resolved: Vec<Value> = arguments
                    .iter()
                    .map(|argument| match argument {
                        Argument::Variable(path) => context.resolve(path),
                        Argument::Literal(text) => Value::String(text.clone()),
                    })
                    .collect();
                let output = implementation
                    .apply(context, &resolved, accumulator.as_ref())
                    .map_err(|source| ParseError::Filter {
                        filter: filter.clone(),
                        source,
                    })?;
                Value::String(output)
            }
        };
        accumulator = Some(value);
    }

    Ok(accumulator)
}

/// Parses and evaluates raw tag content, returning the replacement text
pub fn evaluate_tag(raw: &str, context: &Context, filters: &FilterRegistry) -> Result<String, ParseError> {
    let expression = Expression::parse(raw, filters)?;
    let value = evaluate(&expression, context, filters)?;
    Ok(value.as_ref().map(value_to_string).unwrap_or_default())
}

/// Replaces every tag in `text` in a single pass. Output of a tag is not
/// scanned again.
pub fn render_text(text: &str, context: &Context, filters: &FilterRegistry) -> Result<String, ParseError> {
    let pattern = tag_pattern();
    if !pattern.is_match(text) {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for captures in pattern.captures_iter(text) {
        let Some(whole) = captures.get(0) else { continue };
        let content = captures.get(1).map_or("", |m| m.as_str());
        out.push_str(&text[last..whole.start()]);
        out.push_str(&evaluate_tag(content, context, filters)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}
