//! Expression tree for TMA formulas.
//!
//! Formulas are parsed once into this tree. Symbolic references are
//! rewritten in place until only terminals remain, then the tree is
//! rendered back to perf metric syntax.

use std::fmt;

/// Reference prefix on a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sigil {
    /// `NAME` - info metric or event
    Bare,
    /// `#NAME` - runtime constant, topdown node or auxiliary value
    Hash,
    /// `##NAME` - sum of the node's children
    Sum,
    /// `##?NAME` - max of the node and the sum of its children
    Aggregate,
}

impl Sigil {
    fn as_str(&self) -> &'static str {
        match self {
            Sigil::Bare => "",
            Sigil::Hash => "#",
            Sigil::Sum => "##",
            Sigil::Aggregate => "##?",
        }
    }
}

/// A not-yet-resolved reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub sigil: Sigil,
    pub name: String,
    /// `:mod` suffixes such as `c1` or `sup`
    pub modifiers: Vec<String>,
    /// Raw text of an `@...@` PMU-term group
    pub terms: Option<String>,
}

impl Symbol {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            sigil: Sigil::Bare,
            name: name.into(),
            modifiers: Vec::new(),
            terms: None,
        }
    }

    /// True when the symbol carries event qualifiers
    pub fn is_qualified(&self) -> bool {
        !self.modifiers.is_empty() || self.terms.is_some()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sigil.as_str(), self.name)?;
        for m in &self.modifiers {
            write!(f, ":{}", m)?;
        }
        if let Some(terms) = &self.terms {
            write!(f, "@{}@", terms)?;
        }
        Ok(())
    }
}

/// A resolved hardware event, possibly with PMU terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    pub name: String,
    /// PMU used when modifiers force the `pmu@...@` form
    pub pmu: String,
    /// Escaped terms (`\,cmask\=1`) derived from modifiers
    pub qualifiers: Vec<String>,
    /// `k` or `u` privilege suffix
    pub privilege: Option<char>,
    /// Raw `@...@` group from the source text
    pub terms: Option<String>,
}

impl EventRef {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pmu: String::new(),
            qualifiers: Vec::new(),
            privilege: None,
            terms: None,
        }
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self.privilege.map(String::from).unwrap_or_default();
        match (&self.terms, self.qualifiers.is_empty() && self.privilege.is_none()) {
            (Some(terms), _) => {
                write!(f, "{}@{}{}@{}", self.name, terms, self.qualifiers.concat(), suffix)
            }
            (None, true) => write!(f, "{}", self.name),
            (None, false) => write!(
                f,
                "{}@{}{}@{}",
                self.pmu,
                self.name,
                self.qualifiers.concat(),
                suffix
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&",
            BinOp::Or => "|",
        }
    }
}

/// Formula expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal, kept as written
    Num(String),
    /// Unresolved reference
    Symbol(Symbol),
    /// Resolved hardware event
    Event(EventRef),
    /// Reference to another emitted metric
    Metric(String),
    /// Runtime constant passed through to perf (`#SMT_on`)
    Context(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    /// `then if cond else otherwise`
    Cond {
        then: Box<Expr>,
        cond: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Paren(Box<Expr>),
}

impl Expr {
    pub fn num(text: impl Into<String>) -> Self {
        Expr::Num(text.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn paren(inner: Expr) -> Self {
        Expr::Paren(Box::new(inner))
    }

    /// `a + b + ...` over the given terms, left associative
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Option<Self> {
        terms
            .into_iter()
            .reduce(|acc, term| Expr::binary(BinOp::Add, acc, term))
    }

    /// True for nodes that never need parentheses when substituted
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expr::Num(_)
                | Expr::Symbol(_)
                | Expr::Event(_)
                | Expr::Metric(_)
                | Expr::Context(_)
                | Expr::Call { .. }
                | Expr::Paren(_)
        )
    }

    /// Wrap in parentheses unless already atomic
    pub fn bracket(self) -> Self {
        if self.is_atomic() {
            self
        } else {
            Expr::paren(self)
        }
    }

    /// Numeric value of a decimal literal, looking through parentheses
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Num(text) if !text.starts_with("0x") => text.parse().ok(),
            Expr::Paren(inner) => inner.as_number(),
            _ => None,
        }
    }

    /// True if any unresolved symbol remains
    pub fn has_symbols(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Symbol(_)));
        found
    }

    /// Names of referenced metrics, in order of appearance
    pub fn metric_refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Metric(name) = e {
                if !refs.contains(name) {
                    refs.push(name.clone());
                }
            }
        });
        refs
    }

    /// Pre-order walk over every node
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Neg(inner) | Expr::Paren(inner) => inner.visit(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Expr::Cond {
                then,
                cond,
                otherwise,
            } => {
                then.visit(f);
                cond.visit(f);
                otherwise.visit(f);
            }
            _ => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(text) => write!(f, "{}", text),
            Expr::Symbol(sym) => write!(f, "{}", sym),
            Expr::Event(event) => write!(f, "{}", event),
            Expr::Metric(name) => write!(f, "{}", name),
            Expr::Context(name) => write!(f, "#{}", name),
            Expr::Neg(inner) => write!(f, "-{}", inner),
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.as_str(), rhs),
            Expr::Call { func, args } => {
                write!(f, "{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Cond {
                then,
                cond,
                otherwise,
            } => write!(f, "{} if {} else {}", then, cond, otherwise),
            Expr::Paren(inner) => write!(f, "({})", inner),
        }
    }
}
