//! Symbol resolution over the expression tree.
//!
//! Each pass replaces every remaining `Symbol` node by one step of its
//! definition, then simplifies. Definitions may introduce new symbols, so
//! passes repeat until none are left.

use super::ast::{BinOp, EventRef, Expr, Sigil, Symbol};
use super::parser::parse_formula;
use super::simplify::simplify;
use crate::rules::{ArchRules, Fixups, Rules};
use crate::table::SymbolTable;
use crate::utils::config::MAX_RESOLVE_PASSES;
use crate::utils::error::ResolveError;
use log::trace;

/// Resolves formulas against one architecture's symbol table
pub struct Resolver<'a> {
    table: &'a SymbolTable,
    rules: &'a Rules,
    arch: ArchRules,
    fixups: Fixups,
    pmu: String,
}

impl<'a> Resolver<'a> {
    /// Create a resolver for `shortname`, rendering qualified events on `pmu`
    pub fn new(table: &'a SymbolTable, rules: &'a Rules, shortname: &str, pmu: &str) -> Self {
        Self {
            table,
            rules,
            arch: rules.arch(shortname),
            fixups: rules.fixups_for(shortname),
            pmu: pmu.to_string(),
        }
    }

    /// Apply the architecture fixups to a fragment and parse it
    pub fn parse_fragment(&self, text: &str) -> Result<Expr, ResolveError> {
        let fixed = self.fixups.apply(text);
        Ok(parse_formula(&fixed)?)
    }

    /// Resolve formula text into a tree with no symbolic references left
    ///
    /// **Public** - used for table rows, extra metrics and synthesized metrics
    ///
    /// # Arguments
    /// * `formula` - raw formula text as written in the table
    ///
    /// # Errors
    /// * `ResolveError::Parse` - the text (or a fragment it expands to) is malformed
    /// * `ResolveError::UnknownAux` - `#NAME` names nothing known
    /// * `ResolveError::NoChildren` - `##NAME` on a node without children
    /// * `ResolveError::UnresolvedSymbol` - an event carries an unknown modifier
    /// * `ResolveError::PassLimit` - definitions refer to each other in a cycle
    pub fn resolve(&self, formula: &str) -> Result<Expr, ResolveError> {
        let mut expr = self.parse_fragment(formula)?;
        simplify(&mut expr);

        for pass in 0..MAX_RESOLVE_PASSES {
            if !expr.has_symbols() {
                trace!("Resolved in {} passes: {}", pass, expr);
                return Ok(expr);
            }
            self.substitute(&mut expr)?;
            simplify(&mut expr);
        }

        if expr.has_symbols() {
            return Err(ResolveError::PassLimit(MAX_RESOLVE_PASSES));
        }
        Ok(expr)
    }

    /// Replace every symbol node by one resolution step
    fn substitute(&self, expr: &mut Expr) -> Result<(), ResolveError> {
        match expr {
            Expr::Symbol(sym) => {
                let replacement = self.step(sym)?;
                *expr = replacement;
            }
            Expr::Neg(inner) | Expr::Paren(inner) => self.substitute(inner)?,
            Expr::Binary { lhs, rhs, .. } => {
                self.substitute(lhs)?;
                self.substitute(rhs)?;
            }
            Expr::Call { args, .. } => {
                for arg in args.iter_mut() {
                    self.substitute(arg)?;
                }
            }
            Expr::Cond {
                then,
                cond,
                otherwise,
            } => {
                self.substitute(then)?;
                self.substitute(cond)?;
                self.substitute(otherwise)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn step(&self, sym: &Symbol) -> Result<Expr, ResolveError> {
        match sym.sigil {
            Sigil::Aggregate => {
                let children = self.children_sum(&sym.name)?;
                Ok(Expr::Call {
                    func: "max".to_string(),
                    args: vec![Expr::Symbol(Symbol::bare(sym.name.as_str())), children],
                })
            }
            Sigil::Sum => Ok(Expr::paren(self.children_sum(&sym.name)?)),
            Sigil::Hash => self.hash_reference(&sym.name),
            Sigil::Bare => self.bare_reference(sym),
        }
    }

    /// `C1 + C2 + ...` over the node's children, sorted by name
    fn children_sum(&self, parent: &str) -> Result<Expr, ResolveError> {
        let children = self
            .table
            .children_of(parent)
            .into_iter()
            .map(|c| Expr::Symbol(Symbol::bare(c)));

        Expr::sum(children).ok_or_else(|| ResolveError::NoChildren(parent.to_string()))
    }

    fn hash_reference(&self, name: &str) -> Result<Expr, ResolveError> {
        let context = &self.rules.context;

        if context.keep.iter().any(|k| k == name) {
            return Ok(Expr::Context(name.to_string()));
        }
        if let Some(text) = context.replace.get(name) {
            return Ok(parse_formula(text)?.bracket());
        }
        if name == "Memory" {
            return Ok(Expr::num(if self.arch.memory { "1" } else { "0" }));
        }

        let fragment = self
            .table
            .nodes
            .get(name)
            .or_else(|| self.table.aux.get(name))
            .ok_or_else(|| ResolveError::UnknownAux(name.to_string()))?;

        Ok(self.parse_fragment(fragment)?.bracket())
    }

    fn bare_reference(&self, sym: &Symbol) -> Result<Expr, ResolveError> {
        if sym.is_qualified() {
            return Ok(Expr::Event(self.event_ref(sym)?));
        }

        let name = sym.name.as_str();
        let Some(form) = self.table.info.get(name) else {
            return Ok(Expr::Event(EventRef::plain(name)));
        };

        if self.rules.ignored_metrics.contains(name) {
            return Ok(self.parse_fragment(form)?.bracket());
        }
        if form.trim() == "#NA" {
            return Ok(Expr::num("0"));
        }

        Ok(Expr::Metric(self.table.canonical_name(name).to_string()))
    }

    /// Translate `:mod` suffixes into perf PMU terms
    fn event_ref(&self, sym: &Symbol) -> Result<EventRef, ResolveError> {
        let mut event = EventRef::plain(sym.name.as_str());
        event.pmu = self.pmu.clone();
        event.terms = sym.terms.clone();

        for modifier in &sym.modifiers {
            match modifier.as_str() {
                "sup" | "k" => event.privilege = Some('k'),
                "user" | "u" => event.privilege = Some('u'),
                "i1" => event.qualifiers.push("\\,inv".to_string()),
                "e1" => event.qualifiers.push("\\,edge".to_string()),
                m => {
                    let qualifier = if let Some(hex) = m.strip_prefix("u0x") {
                        is_hex(hex).then(|| format!("\\,umask\\=0x{}", hex))
                    } else if let Some(count) = m.strip_prefix('c') {
                        is_decimal(count).then(|| format!("\\,cmask\\={}", count))
                    } else {
                        None
                    };

                    match qualifier {
                        Some(q) => event.qualifiers.push(q),
                        None => {
                            return Err(ResolveError::UnresolvedSymbol {
                                symbol: sym.to_string(),
                            })
                        }
                    }
                }
            }
        }

        Ok(event)
    }
}

fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_decimal(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Append the zero-weighted slots term when a topdown event lacks it
///
/// Returns the expression unchanged when the family is absent or the
/// slots event is already counted.
pub fn with_companion_slots(expr: Expr, rules: &Rules) -> Result<Expr, ResolveError> {
    let rendered = expr.to_string();
    if !rendered.contains(rules.slots.family.as_str())
        || rendered.contains(rules.slots.token.as_str())
    {
        return Ok(expr);
    }

    let base = match expr {
        Expr::Cond { .. } => Expr::paren(expr),
        other => other,
    };
    let term = parse_formula(&rules.slots.term)?;
    Ok(Expr::binary(BinOp::Add, base, term))
}
