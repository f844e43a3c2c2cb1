//! Recursive-descent parser: consumes the lexer's token stream and builds
//! a [`ParsedProgram`] (spec.md §4.8). No parser-combinator or
//! lexer-generator crate appears anywhere in the retrieval pack, so this
//! is a hand-written descent over a flat `Vec<Token>` — see SPEC_FULL.md
//! §4.8a.
//!
//! Recovery: each block-parsing method that fails records a [`ParseError`]
//! and skips forward to the next `end <keyword>` it can find, so one bad
//! statement doesn't stop the rest of the document from parsing (spec.md
//! §7 "the parser accumulates ErrParse... and keeps going").

use std::collections::{HashMap, HashSet};

use crate::ast::command::{CommandKind, DisplaceBasis, DisplaceTarget, SamplingSpec, Statement, ValueExpr};
use crate::ast::program::{ParsedProgram, ScenarioSpec, Stanza};
use crate::ast::year_matcher::YearMatcher;
use crate::model::stream::{EnabledStream, StreamName};
use crate::model::substance_state::RecoveryStage;
use crate::number::Unit;
use crate::parser::error::{ParseError, ParseResult};
use crate::parser::lexer::{lex, PositionedToken, Token};

pub fn parse_program(source: &str) -> ParseResult {
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser { tokens, pos: 0, errors: lex_errors };
    let program = parser.parse_document();
    ParseResult { program: Some(program), errors: parser.errors }
}

/// A snapshot of the application/substance names a stanza has declared,
/// taken from the default stanza before a policy stanza is parsed, so
/// `modify application "X"` / `modify substance "Y"` inside the policy can
/// be checked against it without holding a live borrow of `ParsedProgram`
/// (spec.md §7 `ErrUnknownApplication`/`ErrUnknownStream`).
struct KnownEntities {
    applications: HashMap<String, HashSet<String>>,
}

impl KnownEntities {
    fn from_stanza(stanza: &Stanza) -> Self {
        let applications = stanza
            .applications
            .iter()
            .map(|app| (app.name.clone(), app.substances.iter().map(|s| s.name.clone()).collect()))
            .collect();
        Self { applications }
    }
}

struct Parser {
    tokens: Vec<PositionedToken>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn pos_of_current(&self) -> (usize, usize) {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        (t.line, t.col)
    }

    fn advance(&mut self) -> PositionedToken {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let (line, col) = self.pos_of_current();
        ParseError::new(line, col, message)
    }

    fn is_ident_ci(&self, expected: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(expected))
    }

    fn eat_ident(&mut self, expected: &str) -> Result<(), ParseError> {
        if self.is_ident_ci(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{expected}', found {:?}", self.peek())))
        }
    }

    fn eat_any_ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error_here(format!("expected an identifier, found {other:?}"))),
        }
    }

    fn eat_string(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error_here(format!("expected a quoted string, found {other:?}"))),
        }
    }

    fn eat_name(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            Token::Ident(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error_here(format!("expected a name, found {other:?}"))),
        }
    }

    fn eat_number(&mut self) -> Result<f64, ParseError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(self.error_here(format!("expected a number, found {other:?}"))),
        }
    }

    fn eat_percent(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek(), Token::Percent) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!("expected '%', found {:?}", self.peek())))
        }
    }

    fn try_eat_comma(&mut self) -> bool {
        if matches!(self.peek(), Token::Comma) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skip tokens until `end <keyword>` (consumed) or `Eof`. Used to
    /// resynchronize after an unrecoverable error inside a block.
    fn skip_to_end_of(&mut self, keyword: &str) {
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Ident(s) if s.eq_ignore_ascii_case("end") => {
                    let save = self.pos;
                    self.advance();
                    if self.is_ident_ci(keyword) {
                        self.advance();
                        return;
                    }
                    // Not our "end" — keep scanning from where we were.
                    self.pos = save + 1;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip the remainder of the current line's tokens — used to recover
    /// from a single bad statement without losing the rest of the block.
    fn skip_to_next_line(&mut self) {
        let line = self.tokens[self.pos.min(self.tokens.len() - 1)].line;
        while self.tokens[self.pos.min(self.tokens.len() - 1)].line == line && !matches!(self.peek(), Token::Eof) {
            self.advance();
        }
    }

    fn parse_document(&mut self) -> ParsedProgram {
        let mut program = ParsedProgram::new();
        let mut seen_policy_names: HashSet<String> = HashSet::new();
        let mut seen_scenario_names: HashSet<String> = HashSet::new();

        while !matches!(self.peek(), Token::Eof) {
            if self.is_ident_ci("start") {
                self.advance();
                self.parse_start_block(&mut program, &mut seen_policy_names, &mut seen_scenario_names);
            } else {
                let err = self.error_here(format!("expected 'start', found {:?}", self.peek()));
                self.errors.push(err);
                self.skip_to_next_line();
            }
        }

        program
    }

    fn parse_start_block(
        &mut self,
        program: &mut ParsedProgram,
        seen_policy_names: &mut HashSet<String>,
        seen_scenario_names: &mut HashSet<String>,
    ) {
        if self.is_ident_ci("default") {
            self.advance();
            self.parse_stanza_body(&mut program.default_stanza, None);
            if let Err(e) = self.eat_ident("end").and_then(|_| self.eat_ident("default")) {
                self.errors.push(e);
                self.skip_to_next_line();
            }
        } else if self.is_ident_ci("policy") {
            self.advance();
            match self.eat_string() {
                Ok(name) => {
                    if !seen_policy_names.insert(name.clone()) {
                        self.errors.push(self.error_here(format!("duplicate policy name '{name}'")));
                    }
                    // A policy's `modify application`/`modify substance`
                    // can only reach into what the default stanza already
                    // declared (spec.md §7 "reference to undeclared
                    // entity"); snapshot those names before borrowing
                    // `program` mutably for the policy stanza itself.
                    let known: KnownEntities = KnownEntities::from_stanza(&program.default_stanza);
                    let stanza = program.policy_stanza_mut(&name);
                    self.parse_stanza_body(stanza, Some(&known));
                    if let Err(e) = self.eat_ident("end").and_then(|_| self.eat_ident("policy")) {
                        self.errors.push(e);
                        self.skip_to_next_line();
                    }
                }
                Err(e) => {
                    self.errors.push(e);
                    self.skip_to_end_of("policy");
                }
            }
        } else if self.is_ident_ci("simulations") {
            self.advance();
            self.parse_simulations(&mut program.scenarios, seen_scenario_names);
            if let Err(e) = self.eat_ident("end").and_then(|_| self.eat_ident("simulations")) {
                self.errors.push(e);
                self.skip_to_next_line();
            }
        } else {
            self.errors.push(self.error_here("expected 'default', 'policy', or 'simulations' after 'start'"));
            self.skip_to_next_line();
        }
    }

    /// `default_entities` is `None` while parsing the default stanza
    /// itself, and `Some` (the default stanza's own application/substance
    /// names) while parsing a policy stanza — `modify application "X"` in
    /// a policy is only valid when `X` is one of those (spec.md §7
    /// `ErrUnknownApplication`).
    fn parse_stanza_body(&mut self, stanza: &mut crate::ast::program::Stanza, default_entities: Option<&KnownEntities>) {
        let mut seen_applications: HashSet<String> = HashSet::new();

        loop {
            if self.is_ident_ci("end") || matches!(self.peek(), Token::Eof) {
                return;
            }
            let is_define = self.is_ident_ci("define");
            let is_modify = self.is_ident_ci("modify");
            if !is_define && !is_modify {
                self.errors.push(self.error_here("expected 'define application' or 'modify application'"));
                self.skip_to_next_line();
                continue;
            }
            self.advance();
            if let Err(e) = self.eat_ident("application") {
                self.errors.push(e);
                self.skip_to_next_line();
                continue;
            }
            let name = match self.eat_string() {
                Ok(n) => n,
                Err(e) => {
                    self.errors.push(e);
                    self.skip_to_end_of("application");
                    continue;
                }
            };
            if is_define && !seen_applications.insert(name.clone()) {
                self.errors.push(self.error_here(format!("duplicate application '{name}'")));
            }
            if is_modify {
                if let Some(known) = default_entities {
                    if !known.applications.contains_key(&name) {
                        self.errors.push(
                            self.error_here(format!("'modify application \"{name}\"' references an application never defined in the default stanza")),
                        );
                        self.skip_to_end_of("application");
                        continue;
                    }
                }
            }
            let default_substances = default_entities.and_then(|known| known.applications.get(&name));
            let app = stanza.application_mut(&name);
            self.parse_application_body(app, default_substances);
            if let Err(e) = self.eat_ident("end").and_then(|_| self.eat_ident("application")) {
                self.errors.push(e);
                self.skip_to_next_line();
            }
        }
    }

    fn parse_application_body(
        &mut self,
        app: &mut crate::ast::program::ApplicationBlock,
        default_substances: Option<&HashSet<String>>,
    ) {
        let mut seen_substances: HashSet<String> = HashSet::new();

        loop {
            if self.is_ident_ci("end") || matches!(self.peek(), Token::Eof) {
                return;
            }
            let is_uses = self.is_ident_ci("uses");
            let is_modify = self.is_ident_ci("modify");
            if !is_uses && !is_modify {
                self.errors.push(self.error_here("expected 'uses substance' or 'modify substance'"));
                self.skip_to_next_line();
                continue;
            }
            self.advance();
            if let Err(e) = self.eat_ident("substance") {
                self.errors.push(e);
                self.skip_to_next_line();
                continue;
            }
            let name = match self.eat_string() {
                Ok(n) => n,
                Err(e) => {
                    self.errors.push(e);
                    self.skip_to_end_of("substance");
                    continue;
                }
            };
            if is_uses && !seen_substances.insert(name.clone()) {
                self.errors.push(self.error_here(format!("duplicate substance '{name}'")));
            }
            if is_modify {
                if let Some(known) = default_substances {
                    if !known.contains(&name) {
                        self.errors.push(
                            self.error_here(format!("'modify substance \"{name}\"' references a substance never defined in the default stanza")),
                        );
                        self.skip_to_end_of("substance");
                        continue;
                    }
                }
            }
            let sub = app.substance_mut(&name);
            self.parse_substance_body(sub);
            if let Err(e) = self.eat_ident("end").and_then(|_| self.eat_ident("substance")) {
                self.errors.push(e);
                self.skip_to_next_line();
            }
        }
    }

    fn parse_substance_body(&mut self, sub: &mut crate::ast::program::SubstanceBlock) {
        loop {
            if self.is_ident_ci("end") || matches!(self.peek(), Token::Eof) {
                return;
            }
            match self.parse_statement() {
                Ok(stmt) => sub.statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.skip_to_next_line();
                }
            }
        }
    }

    fn parse_simulations(&mut self, scenarios: &mut Vec<ScenarioSpec>, seen_scenario_names: &mut HashSet<String>) {
        loop {
            if self.is_ident_ci("end") || matches!(self.peek(), Token::Eof) {
                return;
            }
            if let Err(e) = self.eat_ident("simulate") {
                self.errors.push(e);
                self.skip_to_next_line();
                continue;
            }
            match self.parse_scenario_spec() {
                Ok(spec) => {
                    if !seen_scenario_names.insert(spec.name.clone()) {
                        self.errors.push(self.error_here(format!("duplicate scenario name '{}'", spec.name)));
                    }
                    scenarios.push(spec);
                }
                Err(e) => {
                    self.errors.push(e);
                    self.skip_to_next_line();
                }
            }
        }
    }

    fn parse_scenario_spec(&mut self) -> Result<ScenarioSpec, ParseError> {
        let name = self.eat_string()?;
        let mut policies = Vec::new();
        if self.is_ident_ci("using") {
            self.advance();
            loop {
                policies.push(self.eat_string()?);
                if !self.try_eat_comma() {
                    break;
                }
            }
        }
        self.eat_ident("from")?;
        self.eat_ident("years")?;
        let year_start = self.eat_number()? as i64;
        self.eat_ident("to")?;
        let year_end = self.eat_number()? as i64;
        let mut trials = 1u32;
        if self.is_ident_ci("across") {
            self.advance();
            trials = self.eat_number()? as u32;
            self.eat_ident("trials")?;
        }
        Ok(ScenarioSpec { name, policies, year_start, year_end, trials })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let verb = self.eat_any_ident()?;
        let command = match verb.to_ascii_lowercase().as_str() {
            "enable" => {
                let stream = self.parse_enabled_stream()?;
                CommandKind::Enable { stream }
            }
            "initial" => self.parse_initial_charge()?,
            "equals" => self.parse_equals()?,
            "set" => self.parse_set()?,
            "change" => self.parse_change()?,
            "cap" => self.parse_cap_or_floor(true)?,
            "floor" => self.parse_cap_or_floor(false)?,
            "recharge" => self.parse_recharge()?,
            "retire" => self.parse_retire()?,
            "recover" => self.parse_recover()?,
            "recycle" => self.parse_recycle()?,
            "replace" => self.parse_replace()?,
            other => return Err(self.error_here(format!("unknown command '{other}'"))),
        };
        let year_matcher = self.parse_year_matcher_opt()?;
        Ok(Statement::new(command, year_matcher))
    }

    fn parse_enabled_stream(&mut self) -> Result<EnabledStream, ParseError> {
        let ident = self.eat_any_ident()?;
        match ident.to_ascii_lowercase().as_str() {
            "domestic" | "manufacture" => Ok(EnabledStream::Domestic),
            "import" => Ok(EnabledStream::Import),
            "export" => Ok(EnabledStream::Export),
            other => Err(self.error_here(format!("'{other}' is not an enableable stream"))),
        }
    }

    fn parse_stream_name(&mut self) -> Result<StreamName, ParseError> {
        let ident = self.eat_any_ident()?;
        stream_name_ci(&ident).ok_or_else(|| self.error_here(format!("'{ident}' is not a known stream")))
    }

    fn parse_unit(&mut self) -> Result<Unit, ParseError> {
        let numerator = self.eat_any_ident()?;
        let combined = if matches!(self.peek(), Token::Slash) {
            self.advance();
            let den = self.eat_any_ident()?;
            format!("{numerator} / {den}")
        } else {
            numerator
        };
        Unit::parse(&combined).map_err(|e| self.error_here(e.to_string()))
    }

    /// Cap/floor targets can be a concrete unit or a bare percentage,
    /// resolved against the current stream value by the interpreter
    /// (spec.md §4.1 "% ↔ absolute... for cap/floor N%").
    fn parse_unit_or_percent(&mut self) -> Result<Unit, ParseError> {
        if matches!(self.peek(), Token::Percent) {
            self.advance();
            Ok(Unit::percent())
        } else {
            self.parse_unit()
        }
    }

    fn parse_value(&mut self) -> Result<ValueExpr, ParseError> {
        if self.is_ident_ci("normally") {
            self.advance();
            self.eat_ident("mean")?;
            let mean = self.eat_number()?;
            self.eat_ident("std")?;
            let std = self.eat_number()?;
            let limit = self.parse_limit_opt()?;
            Ok(ValueExpr::Sampled(SamplingSpec::Normal { mean, std, limit }))
        } else if self.is_ident_ci("uniformly") {
            self.advance();
            let low = self.eat_number()?;
            self.eat_ident("to")?;
            let high = self.eat_number()?;
            let limit = self.parse_limit_opt()?;
            Ok(ValueExpr::Sampled(SamplingSpec::Uniform { low, high, limit }))
        } else {
            Ok(ValueExpr::literal(self.eat_number()?))
        }
    }

    fn parse_limit_opt(&mut self) -> Result<Option<(f64, f64)>, ParseError> {
        if self.is_ident_ci("limit") {
            self.advance();
            let lo = self.eat_number()?;
            self.eat_ident("to")?;
            let hi = self.eat_number()?;
            Ok(Some((lo, hi)))
        } else {
            Ok(None)
        }
    }

    fn parse_year_matcher_opt(&mut self) -> Result<YearMatcher, ParseError> {
        if !self.is_ident_ci("during") {
            return Ok(YearMatcher::unconditional());
        }
        self.advance();
        if self.is_ident_ci("year") {
            self.advance();
            let y = self.eat_number()? as i64;
            return Ok(YearMatcher::year(y));
        }
        self.eat_ident("years")?;
        if self.is_ident_ci("beginning") {
            self.advance();
            self.eat_ident("to")?;
            let b = self.eat_number()? as i64;
            return Ok(YearMatcher::through(b));
        }
        let a = self.eat_number()? as i64;
        if self.is_ident_ci("onwards") {
            self.advance();
            return Ok(YearMatcher::onwards(a));
        }
        self.eat_ident("to")?;
        let b = self.eat_number()? as i64;
        Ok(YearMatcher::range(a, b))
    }

    fn parse_displacing_opt(&mut self) -> Result<Option<DisplaceTarget>, ParseError> {
        if !self.is_ident_ci("displacing") {
            return Ok(None);
        }
        self.advance();
        let raw_name = self.eat_name()?;
        let basis = if self.is_ident_ci("by") {
            self.advance();
            let b = self.eat_any_ident()?;
            match b.to_ascii_lowercase().as_str() {
                "units" | "unit" => Some(DisplaceBasis::Units),
                "volume" => Some(DisplaceBasis::Volume),
                other => return Err(self.error_here(format!("'{other}' is not a displacement basis"))),
            }
        } else {
            None
        };
        Ok(Some(DisplaceTarget { raw_name, basis }))
    }

    fn parse_initial_charge(&mut self) -> Result<CommandKind, ParseError> {
        self.eat_ident("charge")?;
        self.eat_ident("with")?;
        let value = self.parse_value()?;
        let units = self.parse_unit()?;
        self.eat_ident("for")?;
        let stream = self.parse_enabled_stream()?;
        Ok(CommandKind::InitialCharge { stream, value, units })
    }

    fn parse_equals(&mut self) -> Result<CommandKind, ParseError> {
        let value = self.parse_value()?;
        let units = self.parse_unit()?;
        if units == Unit::kg_co2e_per_kg() {
            Ok(CommandKind::EqualsGhgIntensity { value, units })
        } else if units.numerator == crate::number::SimpleUnit::Kwh {
            Ok(CommandKind::EqualsEnergyIntensity { value, units })
        } else {
            Err(self.error_here("'equals' expects 'kgCO2e / kg' or 'kwh / unit' / 'kwh / kg'"))
        }
    }

    fn parse_set(&mut self) -> Result<CommandKind, ParseError> {
        let stream = self.parse_stream_name()?;
        if self.is_ident_ci("to") {
            self.advance();
            let value = self.parse_value()?;
            let units = self.parse_unit()?;
            Ok(CommandKind::SetAbsolute { stream, value, units })
        } else {
            self.eat_ident("by")?;
            let percent = self.parse_value()?;
            self.eat_percent()?;
            Ok(CommandKind::SetRelativePercent { stream, percent })
        }
    }

    fn parse_change(&mut self) -> Result<CommandKind, ParseError> {
        let stream = self.parse_stream_name()?;
        self.eat_ident("by")?;
        let value = self.parse_value()?;
        if matches!(self.peek(), Token::Percent) {
            self.advance();
            Ok(CommandKind::ChangeRelativePercent { stream, percent: value })
        } else {
            let units = self.parse_unit()?;
            Ok(CommandKind::ChangeAbsolute { stream, value, units })
        }
    }

    fn parse_cap_or_floor(&mut self, is_cap: bool) -> Result<CommandKind, ParseError> {
        let stream = self.parse_stream_name()?;
        self.eat_ident("to")?;
        let value = self.parse_value()?;
        let units = self.parse_unit_or_percent()?;
        let displacing = self.parse_displacing_opt()?;
        if is_cap {
            Ok(CommandKind::Cap { stream, value, units, displacing })
        } else {
            Ok(CommandKind::Floor { stream, value, units, displacing })
        }
    }

    fn parse_recharge(&mut self) -> Result<CommandKind, ParseError> {
        let percent = self.parse_value()?;
        self.eat_percent()?;
        self.eat_ident("each")?;
        self.eat_ident("year")?;
        self.eat_ident("with")?;
        let kg_per_unit = self.parse_value()?;
        let units = self.parse_unit()?;
        if units != Unit::kg_per_unit() {
            return Err(self.error_here("'recharge ... with' expects 'kg / unit'"));
        }
        Ok(CommandKind::Recharge { percent, kg_per_unit })
    }

    fn parse_retire(&mut self) -> Result<CommandKind, ParseError> {
        let percent = self.parse_value()?;
        self.eat_percent()?;
        self.eat_ident("each")?;
        self.eat_ident("year")?;
        let with_replacement = if self.is_ident_ci("with") {
            self.advance();
            self.eat_ident("replacement")?;
            true
        } else {
            false
        };
        Ok(CommandKind::Retire { percent, with_replacement })
    }

    fn parse_recover(&mut self) -> Result<CommandKind, ParseError> {
        let value = self.parse_value()?;
        let units = self.parse_unit()?;
        self.eat_ident("for")?;
        let stage_ident = self.eat_any_ident()?;
        let stage = match stage_ident.to_ascii_lowercase().as_str() {
            "recharge" => RecoveryStage::Recharge,
            "eol" => RecoveryStage::Eol,
            other => return Err(self.error_here(format!("'{other}' is not a recovery stage"))),
        };
        let displacing = self.parse_displacing_opt()?;
        Ok(CommandKind::Recover { value, units, stage, displacing })
    }

    fn parse_recycle(&mut self) -> Result<CommandKind, ParseError> {
        let stage_ident = self.eat_any_ident()?;
        let stage = match stage_ident.to_ascii_lowercase().as_str() {
            "recharge" => RecoveryStage::Recharge,
            "eol" => RecoveryStage::Eol,
            other => return Err(self.error_here(format!("'{other}' is not a recovery stage"))),
        };
        self.eat_ident("with")?;
        let percent = self.parse_value()?;
        self.eat_percent()?;
        let displacing = if self.is_ident_ci("displacing") {
            self.advance();
            Some(self.eat_name()?)
        } else {
            None
        };
        Ok(CommandKind::Recycle { stage, percent, displacing })
    }

    fn parse_replace(&mut self) -> Result<CommandKind, ParseError> {
        let value = self.parse_value()?;
        let units = self.parse_unit()?;
        self.eat_ident("of")?;
        let from_substance = self.eat_name()?;
        self.eat_ident("with")?;
        let to_substance = self.eat_name()?;
        Ok(CommandKind::Replace { value, units, from_substance, to_substance })
    }
}

fn stream_name_ci(ident: &str) -> Option<StreamName> {
    match ident.to_ascii_lowercase().as_str() {
        "domestic" | "manufacture" => Some(StreamName::Domestic),
        "import" => Some(StreamName::Import),
        "export" => Some(StreamName::Export),
        "sales" => Some(StreamName::Sales),
        "recycle" => Some(StreamName::Recycle),
        "recyclerecharge" => Some(StreamName::RecycleRecharge),
        "recycleeol" => Some(StreamName::RecycleEol),
        "priorequipment" => Some(StreamName::PriorEquipment),
        "equipment" => Some(StreamName::Equipment),
        "retired" => Some(StreamName::Retired),
        "consumption" => Some(StreamName::Consumption),
        "energy" => Some(StreamName::Energy),
        "rechargeemissions" => Some(StreamName::RechargeEmissions),
        "eolemissions" => Some(StreamName::EolEmissions),
        "exportemissions" => Some(StreamName::ExportEmissions),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_PROGRAM: &str = r#"
        start default
          define application "Commercial Refrigeration"
            uses substance "HFC-134a"
              enable domestic
              initial charge with 1 kg / unit for domestic
              set domestic to 1 mt during year 1
              retire 5 % each year
              recharge 5 % each year with 0.85 kg / unit
              equals 1430 kgCO2e / kg
              equals 1 kwh / unit
            end substance
          end application
        end default

        start simulations
          simulate "BAU" from years 1 to 10
        end simulations
    "#;

    #[test]
    fn parses_simple_program_without_errors() {
        let result = parse_program(SIMPLE_PROGRAM);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        let program = result.program.unwrap();
        assert_eq!(program.default_stanza.applications.len(), 1);
        assert_eq!(program.scenarios.len(), 1);
        assert_eq!(program.scenarios[0].year_start, 1);
        assert_eq!(program.scenarios[0].year_end, 10);
    }

    #[test]
    fn parses_policy_and_using_clause() {
        let src = r#"
            start default
              define application "A"
                uses substance "S"
                  enable domestic
                end substance
              end application
            end default

            start policy "Recycling"
              modify application "A"
                modify substance "S"
                  recycle recharge with 30 % displacing domestic
                end substance
              end application
            end policy

            start simulations
              simulate "With Recycling" using "Recycling" from years 1 to 5 across 50 trials
            end simulations
        "#;
        let result = parse_program(src);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        let program = result.program.unwrap();
        assert!(program.policy_stanzas.contains_key("Recycling"));
        assert_eq!(program.scenarios[0].policies, vec!["Recycling".to_string()]);
        assert_eq!(program.scenarios[0].trials, 50);
    }

    #[test]
    fn duplicate_scenario_name_is_an_error() {
        let src = r#"
            start simulations
              simulate "X" from years 1 to 2
              simulate "X" from years 1 to 2
            end simulations
        "#;
        let result = parse_program(src);
        assert!(result.errors.iter().any(|e| e.message.contains("duplicate scenario")));
    }

    #[test]
    fn cap_with_percent_and_displacing_by_units() {
        let src = r#"
            start default
              define application "A"
                uses substance "X"
                  cap sales to 80 % displacing Y by units during years 1 to 5
                end substance
              end application
            end default
        "#;
        let result = parse_program(src);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        let program = result.program.unwrap();
        let stmt = &program.default_stanza.applications[0].substances[0].statements[0];
        match &stmt.command {
            CommandKind::Cap { units, displacing, .. } => {
                assert_eq!(*units, Unit::percent());
                let target = displacing.as_ref().unwrap();
                assert_eq!(target.raw_name, "Y");
                assert_eq!(target.basis, Some(DisplaceBasis::Units));
            }
            other => panic!("expected Cap, got {other:?}"),
        }
        assert_eq!(stmt.year_matcher, YearMatcher::range(1, 5));
    }

    #[test]
    fn sampled_value_parses_as_sampling_node() {
        let src = r#"
            start default
              define application "A"
                uses substance "X"
                  enable domestic
                  set domestic to normally mean 1000 std 100 kg
                end substance
              end application
            end default
        "#;
        let result = parse_program(src);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        let program = result.program.unwrap();
        let stmt = &program.default_stanza.applications[0].substances[0].statements[1];
        match &stmt.command {
            CommandKind::SetAbsolute { value: ValueExpr::Sampled(SamplingSpec::Normal { mean, std, .. }), .. } => {
                assert_eq!(*mean, 1000.0);
                assert_eq!(*std, 100.0);
            }
            other => panic!("expected a sampled SetAbsolute, got {other:?}"),
        }
    }
}
