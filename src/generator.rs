//! Generator - single entry point for template expansion
//!
//! `expand` never touches the template it is given: every call works on a
//! deep clone, so one loaded template serves any number of documents.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::config::{GeneratorConfig, StructureNames};
use crate::context::Context;
use crate::error::ParseError;
use crate::expression::Expression;
use crate::filters::{Filter, FilterRegistry};
use crate::pipeline::{render_text, tag_pattern};
use crate::tree::Node;
use crate::unroll::{self, loop_end_pattern, parse_loop_start};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TagKind {
    LoopStart { collection: String, binding: String },
    LoopEnd,
    Expression,
}

/// A tag found in template text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagReport {
    pub tag: String,
    pub kind: TagKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Generator {
    filters: FilterRegistry,
    structure: StructureNames,
}

impl Generator {
    /// Generator for WordprocessingML trees with the built-in filters
    pub fn new() -> Self {
        Self::with_structure(StructureNames::default())
    }

    pub fn with_structure(structure: StructureNames) -> Self {
        Self {
            filters: FilterRegistry::new(),
            structure,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::with_structure(config.structure.clone())
    }

    pub fn structure(&self) -> &StructureNames {
        &self.structure
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Adds a filter, replacing a filter of the same name
    pub fn register_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.register(filter);
    }

    /// Expands a template tree against `context`.
    ///
    /// Fails with the first template error; otherwise the result holds no loop
    /// markers and no substitution tags.
    pub fn expand(&self, template: &Node, context: &Context) -> Result<Node, ParseError> {
        let mut root = template.clone();
        let mut context = context.clone();
        self.expand_in_place(&mut root, &mut context)?;
        Ok(root)
    }

    /// Expands the same template once per context, lazily and in order
    pub fn expand_many<'a, I>(
        &'a self,
        template: &'a Node,
        contexts: I,
    ) -> impl Iterator<Item = Result<Node, ParseError>> + 'a
    where
        I: IntoIterator<Item = &'a Context>,
        I::IntoIter: 'a,
    {
        contexts
            .into_iter()
            .map(move |context| self.expand(template, context))
    }

    /// Unrolls every loop, restarting from the root after each one, then
    /// substitutes the remaining tags. Loop output is already expanded and is
    /// only merged into its parent at the end.
    pub(crate) fn expand_in_place(&self, root: &mut Node, context: &mut Context) -> Result<(), ParseError> {
        while unroll::unroll_first(self, root, context)? {}

        let context = &*context;
        root.try_for_each_text_mut(self.structure.text_container.as_deref(), &mut |text| {
            if tag_pattern().is_match(text) {
                *text = render_text(text, context, &self.filters)?;
            }
            Ok(())
        })?;

        root.flatten_fragments();
        Ok(())
    }

    /// Lists every tag in the template's text in document order. Expressions
    /// that fail to parse carry the parse error.
    pub fn tags(&self, template: &Node) -> Vec<TagReport> {
        let mut reports = vec![];
        for (_, text) in template.texts(self.structure.text_container.as_deref()) {
            for found in brace_pattern().find_iter(text) {
                let tag = found.as_str();
                let report = if let Some((header, _)) = parse_loop_start(tag) {
                    TagReport {
                        tag: tag.to_string(),
                        kind: TagKind::LoopStart {
                            collection: header.collection,
                            binding: header.binding,
                        },
                        error: None,
                    }
                } else if loop_end_pattern().is_match(tag) {
                    TagReport {
                        tag: tag.to_string(),
                        kind: TagKind::LoopEnd,
                        error: None,
                    }
                } else if let Some(content) = tag_pattern().captures(tag).and_then(|c| c.get(1)) {
                    TagReport {
                        tag: tag.to_string(),
                        kind: TagKind::Expression,
                        error: Expression::parse(content.as_str(), &self.filters)
                            .err()
                            .map(|e| e.to_string()),
                    }
                } else {
                    continue;
                };
                reports.push(report);
            }
        }
        reports
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

fn brace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{[^{}]*\}").expect("valid brace pattern"))
}
