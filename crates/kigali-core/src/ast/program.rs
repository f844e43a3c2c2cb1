//! `ParsedProgram`: the top-level AST a parsed DSL document produces
//! (spec.md §4.3, §4.7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::command::Statement;

/// `uses substance "Name" { ... }` — an ordered list of statements scoped
/// to one substance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstanceBlock {
    pub name: String,
    pub statements: Vec<Statement>,
}

impl SubstanceBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), statements: Vec::new() }
    }
}

/// `define application "Name" { ... }` / `modify application "Name" { ...
/// }` — an ordered list of substance blocks. The two forms build the same
/// shape; the distinction that matters is enforced by the parser, not by
/// this type: inside a policy stanza, `modify application`/`modify
/// substance` must name something the default stanza already declared —
/// see `parser::grammar::Parser::parse_stanza_body`'s `default_entities`
/// check (spec.md §7 `ErrUnknownApplication`/`ErrUnknownStream`). This
/// type's own `application_mut`/`substance_mut` are plain get-or-create and
/// don't themselves check anything; they're shared by both `define` and an
/// already-validated `modify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationBlock {
    pub name: String,
    pub substances: Vec<SubstanceBlock>,
}

impl ApplicationBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), substances: Vec::new() }
    }

    /// Find (or create, preserving declaration order) the block for one
    /// substance — used both while parsing a single stanza (repeated
    /// `uses substance` blocks for the same substance accumulate
    /// statements) and while an already-validated `modify substance`
    /// merges into this one. Existence of the named substance is checked
    /// by the caller before this is reached; this always succeeds.
    pub fn substance_mut(&mut self, name: &str) -> &mut SubstanceBlock {
        if let Some(idx) = self.substances.iter().position(|s| s.name == name) {
            &mut self.substances[idx]
        } else {
            self.substances.push(SubstanceBlock::new(name));
            self.substances.last_mut().unwrap()
        }
    }
}

/// One `start default` / `start policy "Name"` block: an ordered list of
/// application blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Stanza {
    pub applications: Vec<ApplicationBlock>,
}

impl Stanza {
    pub fn application_mut(&mut self, name: &str) -> &mut ApplicationBlock {
        if let Some(idx) = self.applications.iter().position(|a| a.name == name) {
            &mut self.applications[idx]
        } else {
            self.applications.push(ApplicationBlock::new(name));
            self.applications.last_mut().unwrap()
        }
    }
}

/// `simulate "Name" using <policies> from years A to B [across N trials]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    /// Policy stanza names, applied in the listed order — later policies
    /// can see and further modify the state earlier policies left behind
    /// (spec.md §4.3 "Policy stacking").
    pub policies: Vec<String>,
    pub year_start: i64,
    pub year_end: i64,
    /// `1` for a deterministic run; `>1` triggers the Monte Carlo driver.
    pub trials: u32,
}

/// The full parsed DSL document: the `default` stanza, every named policy
/// stanza, and every `simulate` scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParsedProgram {
    pub default_stanza: Stanza,
    pub policy_stanzas: HashMap<String, Stanza>,
    pub scenarios: Vec<ScenarioSpec>,
}

impl ParsedProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy_stanza_mut(&mut self, name: &str) -> &mut Stanza {
        self.policy_stanzas.entry(name.to_string()).or_default()
    }
}
