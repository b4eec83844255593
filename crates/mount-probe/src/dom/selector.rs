//! CSS selector parsing and matching.
//!
//! Supported: type, universal, `#id`, `.class`, attribute conditions
//! (`[a]`, `=`, `^=`, `$=`, `*=`, `~=`, `|=`), the pseudo-classes
//! `:first-child`, `:last-child`, `:only-child`, `:checked`, `:disabled`,
//! `:not(..)`, the four combinators and comma-separated groups.

use super::{Document, NodeId};
use crate::result::{MountError, MountResult};

/// A parsed, comma-separated selector group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

/// Compounds joined by combinators, leftmost first.
/// `combinators[i]` sits between `parts[i]` and `parts[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists(String),
    Eq(String, String),
    StartsWith(String, String),
    EndsWith(String, String),
    Contains(String, String),
    Includes(String, String),
    DashMatch(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    Checked,
    Disabled,
    Not(Vec<Compound>),
}

impl SelectorList {
    /// Parse a selector group
    pub fn parse(source: &str) -> MountResult<Self> {
        let mut parser = Parser::new(source);
        let mut selectors = Vec::new();
        loop {
            selectors.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.bump(),
                Some(c) => return Err(parser.error(format!("unexpected '{c}'"))),
            }
        }
        Ok(Self {
            source: source.to_string(),
            selectors,
        })
    }

    /// Selector text as written
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when any selector in the group matches the element
    #[must_use]
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(doc, id))
    }
}

impl ComplexSelector {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.match_from(doc, id, self.parts.len() - 1)
    }

    fn match_from(&self, doc: &Document, id: NodeId, index: usize) -> bool {
        if !self.parts[index].matches(doc, id) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Descendant => {
                let mut cursor = doc.parent_element(id);
                while let Some(ancestor) = cursor {
                    if self.match_from(doc, ancestor, index - 1) {
                        return true;
                    }
                    cursor = doc.parent_element(ancestor);
                }
                false
            }
            Combinator::Child => doc
                .parent_element(id)
                .is_some_and(|parent| self.match_from(doc, parent, index - 1)),
            Combinator::AdjacentSibling => doc
                .previous_element_sibling(id)
                .is_some_and(|prev| self.match_from(doc, prev, index - 1)),
            Combinator::GeneralSibling => {
                let mut cursor = doc.previous_element_sibling(id);
                while let Some(prev) = cursor {
                    if self.match_from(doc, prev, index - 1) {
                        return true;
                    }
                    cursor = doc.previous_element_sibling(prev);
                }
                false
            }
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(el) = doc.element(id) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(el.tag()) {
                return false;
            }
        }
        if let Some(expected) = &self.id {
            if el.attr("id") != Some(expected.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = el.classes();
            if !self.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        self.attrs.iter().all(|cond| cond.matches(el.attr(cond.name())))
            && self.pseudos.iter().all(|p| p.matches(doc, id))
    }
}

impl AttrCondition {
    fn name(&self) -> &str {
        match self {
            Self::Exists(name)
            | Self::Eq(name, _)
            | Self::StartsWith(name, _)
            | Self::EndsWith(name, _)
            | Self::Contains(name, _)
            | Self::Includes(name, _)
            | Self::DashMatch(name, _) => name,
        }
    }

    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            Self::Exists(_) => true,
            Self::Eq(_, v) => actual == v,
            Self::StartsWith(_, v) => !v.is_empty() && actual.starts_with(v.as_str()),
            Self::EndsWith(_, v) => !v.is_empty() && actual.ends_with(v.as_str()),
            Self::Contains(_, v) => !v.is_empty() && actual.contains(v.as_str()),
            Self::Includes(_, v) => actual.split_whitespace().any(|t| t == v),
            Self::DashMatch(_, v) => {
                actual == v
                    || actual
                        .strip_prefix(v.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }
        }
    }
}

impl Pseudo {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        match self {
            Self::FirstChild => doc.previous_element_sibling(id).is_none() && doc.parent(id).is_some(),
            Self::LastChild => doc
                .parent(id)
                .is_some_and(|p| doc.element_children(p).last() == Some(&id)),
            Self::OnlyChild => doc
                .parent(id)
                .is_some_and(|p| doc.element_children(p) == [id]),
            Self::Checked => match doc.tag_name(id) {
                Some("option") => doc.is_selected(id),
                Some("input") => doc.is_checked(id),
                _ => false,
            },
            Self::Disabled => doc.attribute(id, "disabled").is_some(),
            Self::Not(inner) => !inner.iter().any(|c| c.matches(doc, id)),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> MountError {
        MountError::invalid_selector(self.source, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn complex(&mut self) -> MountResult<ComplexSelector> {
        self.skip_ws();
        let mut parts = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::AdjacentSibling,
                Some('~') => Combinator::GeneralSibling,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{c}'"))),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_ws();
            }
            combinators.push(combinator);
            parts.push(self.compound()?);
        }
        Ok(ComplexSelector { parts, combinators })
    }

    fn compound(&mut self) -> MountResult<Compound> {
        let mut compound = Compound::default();
        if self.eat('*') {
            compound.tag = Some("*".to_string());
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected selector, found '{c}'")),
                None => self.error("expected selector"),
            });
        }
        Ok(compound)
    }

    fn ident(&mut self) -> MountResult<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                out.push(escaped);
                self.bump();
            } else if is_ident_char(c) {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(out)
    }

    fn attribute(&mut self) -> MountResult<AttrCondition> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        if self.eat(']') {
            return Ok(AttrCondition::Exists(name));
        }
        let op = match self.peek() {
            Some('=') => None,
            Some(c @ ('^' | '$' | '*' | '~' | '|')) => {
                self.bump();
                Some(c)
            }
            Some(c) => return Err(self.error(format!("unexpected '{c}' in attribute"))),
            None => return Err(self.error("unterminated attribute")),
        };
        if !self.eat('=') {
            return Err(self.error("expected '=' in attribute"));
        }
        self.skip_ws();
        let value = self.attribute_value()?;
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("unterminated attribute"));
        }
        Ok(match op {
            None => AttrCondition::Eq(name, value),
            Some('^') => AttrCondition::StartsWith(name, value),
            Some('$') => AttrCondition::EndsWith(name, value),
            Some('*') => AttrCondition::Contains(name, value),
            Some('~') => AttrCondition::Includes(name, value),
            Some(_) => AttrCondition::DashMatch(name, value),
        })
    }

    fn attribute_value(&mut self) -> MountResult<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated string")),
                        Some(c) if c == quote => {
                            self.bump();
                            return Ok(out);
                        }
                        Some('\\') => {
                            self.bump();
                            if let Some(c) = self.peek() {
                                out.push(c);
                                self.bump();
                            }
                        }
                        Some(c) => {
                            out.push(c);
                            self.bump();
                        }
                    }
                }
            }
            _ => self.ident(),
        }
    }

    fn pseudo(&mut self) -> MountResult<Pseudo> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Pseudo::FirstChild),
            "last-child" => Ok(Pseudo::LastChild),
            "only-child" => Ok(Pseudo::OnlyChild),
            "checked" => Ok(Pseudo::Checked),
            "disabled" => Ok(Pseudo::Disabled),
            "not" => {
                if !self.eat('(') {
                    return Err(self.error("expected '(' after :not"));
                }
                let mut inner = Vec::new();
                loop {
                    self.skip_ws();
                    inner.push(self.compound()?);
                    self.skip_ws();
                    if self.eat(')') {
                        break;
                    }
                    if !self.eat(',') {
                        return Err(self.error("unterminated :not()"));
                    }
                }
                Ok(Pseudo::Not(inner))
            }
            other => Err(self.error(format!("unsupported pseudo-class ':{other}'"))),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
