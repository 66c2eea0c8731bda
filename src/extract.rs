//! Pick evaluation: select an element, take a string from it, then
//! optionally filter it through a regular expression.

use std::collections::HashMap;

use regex::Regex;

use crate::ast::Take;
use crate::codegen::{PickStep, SelectStep};
use crate::dom::{Document, DomError, DomFactory, Element};
use crate::error::RuntimeError;
use crate::value::Value;

/// Picks of one select step, with selectors checked and patterns compiled.
#[derive(Debug, Default)]
pub struct Extractor {
    patterns: HashMap<String, Regex>,
}

impl Extractor {
    /// Validates every selector and compiles every pattern of `step`.
    pub fn prepare(step: &SelectStep, dom: &dyn DomFactory) -> Result<Self, RuntimeError> {
        if let Some(nodes) = step.download().and_then(|d| d.nodes.as_deref()) {
            dom.validate_selector(nodes).map_err(selector_error)?;
        }

        let mut patterns = HashMap::new();
        for pick in step.picks() {
            dom.validate_selector(&pick.selector)
                .map_err(selector_error)?;
            if let Some(pattern) = &pick.pattern
                && !patterns.contains_key(pattern)
            {
                patterns.insert(pattern.clone(), compile(pattern)?);
            }
        }
        Ok(Extractor { patterns })
    }

    /// Context elements of a page: every `nodes` match, or the root.
    pub fn contexts<'d>(
        &self,
        document: &'d dyn Document,
        nodes: Option<&str>,
    ) -> Result<Vec<Box<dyn Element + 'd>>, RuntimeError> {
        match nodes {
            Some(selector) => document.select(selector).map_err(selector_error),
            None => Ok(vec![document.root()]),
        }
    }

    /// Evaluates `pick` within `context`. Yields null when nothing matches.
    pub fn pick(&self, pick: &PickStep, context: &dyn Element) -> Result<Value, RuntimeError> {
        let found = context.select(&pick.selector).map_err(selector_error)?;
        let Some(element) = found.first() else {
            return Ok(Value::Null);
        };
        let Some(text) = take(element.as_ref(), &pick.take) else {
            return Ok(Value::Null);
        };

        let Some(pattern) = &pick.pattern else {
            return Ok(Value::String(text));
        };
        let compiled;
        let regex = match self.patterns.get(pattern) {
            Some(regex) => regex,
            None => {
                compiled = compile(pattern)?;
                &compiled
            }
        };

        let result = match &pick.replace {
            Some(template) => apply_replace(&text, regex, template),
            None => apply_match(&text, regex),
        };
        Ok(result.map(Value::String).unwrap_or(Value::Null))
    }
}

fn take(element: &dyn Element, take: &Take) -> Option<String> {
    match take {
        Take::Text => Some(element.text()),
        Take::Html => Some(element.inner_html()),
        Take::Attribute(name) => element.attribute(name),
    }
}

/// Concatenation of every match, `None` when there is none.
pub fn apply_match(text: &str, regex: &Regex) -> Option<String> {
    let mut found = regex.find_iter(text).peekable();
    found.peek()?;
    Some(found.map(|m| m.as_str()).collect())
}

/// Every match replaced by `template`, `None` when there is no match.
///
/// `$1` in the template refers to the first capture group even when
/// letters follow it.
pub fn apply_replace(text: &str, regex: &Regex, template: &str) -> Option<String> {
    if !regex.is_match(text) {
        return None;
    }
    let template = normalize_template(template);
    Some(regex.replace_all(text, template.as_str()).into_owned())
}

fn normalize_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                out.push_str("$$");
                chars.next();
            }
            Some(d) if d.is_ascii_digit() => {
                out.push_str("${");
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    out.push(d);
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push('$'),
        }
    }
    out
}

fn compile(pattern: &str) -> Result<Regex, RuntimeError> {
    Regex::new(pattern).map_err(|source| RuntimeError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

fn selector_error(error: DomError) -> RuntimeError {
    match error {
        DomError::Selector { selector, message } => RuntimeError::Selector { selector, message },
        DomError::Load(message) => RuntimeError::Type(message),
    }
}
