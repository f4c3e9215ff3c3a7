use crate::element::{is_name_char, TemplateElement, DELIMITER};
use crate::error::{Result, TemplateError};
use crate::path::{self, SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Element(TemplateElement),
}

/// A validated template string such as `org:root:%ETAB%:%CLASSE%`.
///
/// Parsing rejects any `%NAME%` token whose name is not a known
/// [`TemplateElement`], so a `Template` that exists can always be evaluated
/// once enough values are supplied. A `%` that does not open such a token is
/// kept as literal text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse and validate a template string
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let segments = tokenize(&source)?;
        Ok(Self { source, segments })
    }

    /// The root of the resource tree
    pub fn root() -> Self {
        Self {
            source: String::new(),
            segments: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_root(&self) -> bool {
        self.source.is_empty()
    }

    /// The elements referenced by the template (its mask)
    pub fn elements(&self) -> BTreeSet<TemplateElement> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Element(element) => Some(*element),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// True when the template contains no placeholder
    pub fn is_constant(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Substitute `values` into the placeholders.
    ///
    /// `values[e.position()]` is used for element `e`. A referenced element
    /// whose value is absent or empty fails with [`TemplateError::MissingValue`].
    pub fn evaluate<S: AsRef<str>>(&self, values: &[S]) -> Result<String> {
        self.substitute(values, false)
    }

    /// Like [`Template::evaluate`], for templates that name a path.
    ///
    /// A value holding the path separator fails with
    /// [`TemplateError::SeparatorInValue`], so the result always has as many
    /// segments as the template.
    pub fn evaluate_path<S: AsRef<str>>(&self, values: &[S]) -> Result<String> {
        self.substitute(values, true)
    }

    fn substitute<S: AsRef<str>>(&self, values: &[S], single_segment: bool) -> Result<String> {
        let mut evaluated = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => evaluated.push_str(text),
                Segment::Element(element) => {
                    let value = values
                        .get(element.position())
                        .map(AsRef::as_ref)
                        .filter(|value| !value.is_empty())
                        .ok_or_else(|| TemplateError::MissingValue {
                            element: *element,
                            position: element.position(),
                            template: self.source.clone(),
                        })?;
                    if single_segment && value.contains(path::SEPARATOR) {
                        return Err(TemplateError::SeparatorInValue {
                            element: *element,
                            value: value.to_string(),
                            template: self.source.clone(),
                        });
                    }
                    evaluated.push_str(value);
                }
            }
        }
        Ok(evaluated)
    }

    /// Whether `concrete` could be the result of evaluating this template.
    ///
    /// Each placeholder stands for one or more characters other than the
    /// path separator.
    pub fn matches(&self, concrete: &str) -> bool {
        match_segments(&self.segments, concrete)
    }

    /// Template of the containing folder: everything before the last separator.
    ///
    /// A single segment template has the root as parent; the root has none.
    pub fn parent(&self) -> Option<Template> {
        if self.is_root() {
            return None;
        }
        let head = path::parent_path(&self.source)?;
        // A prefix cut at a separator never splits a placeholder.
        Template::parse(head).ok()
    }

    /// Number of separators, i.e. depth below the root minus one
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.source.matches(SEPARATOR).count() + 1
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = source;

    while let Some(start) = rest.find(DELIMITER) {
        literal.push_str(&rest[..start]);
        let after = &rest[start + DELIMITER.len_utf8()..];

        match after.find(DELIMITER) {
            Some(end) if end > 0 && after[..end].chars().all(is_name_char) => {
                let name = &after[..end];
                let element = TemplateElement::from_name(name).ok_or_else(|| {
                    TemplateError::UnknownTemplateElement {
                        element: name.to_string(),
                        template: source.to_string(),
                    }
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Element(element));
                rest = &after[end + DELIMITER.len_utf8()..];
            }
            _ => {
                literal.push(DELIMITER);
                rest = after;
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn match_segments(segments: &[Segment], input: &str) -> bool {
    match segments.split_first() {
        None => input.is_empty(),
        Some((Segment::Literal(text), rest)) => input
            .strip_prefix(text.as_str())
            .is_some_and(|tail| match_segments(rest, tail)),
        Some((Segment::Element(_), rest)) => {
            let limit = input.find(SEPARATOR).unwrap_or(input.len());
            (1..=limit)
                .filter(|end| input.is_char_boundary(*end))
                .any(|end| match_segments(rest, &input[end..]))
        }
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Template {}

impl Hash for Template {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self> {
        Template::parse(value)
    }
}

impl TryFrom<&str> for Template {
    type Error = TemplateError;

    fn try_from(value: &str) -> Result<Self> {
        Template::parse(value)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.source
    }
}
