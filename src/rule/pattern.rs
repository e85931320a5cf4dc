//! Terms and triple patterns.

use serde::{Deserialize, Serialize};

use crate::symbol::SymbolId;

// ---------------------------------------------------------------------------
// Variables and terms
// ---------------------------------------------------------------------------

/// A variable slot. Equal slots denote the same binding within a rule.
///
/// Rendered as `?a`, `?b`, … `?z`, then `?v26`, `?v27`, …
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Var(pub u16);

impl Var {
    /// The slot right after this one.
    pub fn next(self) -> Var {
        Var(self.0 + 1)
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 26 {
            write!(f, "?{}", (b'a' + self.0 as u8) as char)
        } else {
            write!(f, "?v{}", self.0)
        }
    }
}

/// A term in a triple pattern: a bound constant or a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Const(SymbolId),
    Var(Var),
}

impl Term {
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn as_var(&self) -> Option<Var> {
        match self {
            Term::Var(v) => Some(*v),
            Term::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<SymbolId> {
        match self {
            Term::Const(c) => Some(*c),
            Term::Var(_) => None,
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

impl From<SymbolId> for Term {
    fn from(c: SymbolId) -> Self {
        Term::Const(c)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Const(c) => write!(f, "{c}"),
            Term::Var(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Argument position inside a triple pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Subject,
    Relation,
    Object,
}

impl Position {
    /// The other argument position. `Relation` maps to itself.
    pub fn opposite(self) -> Position {
        match self {
            Position::Subject => Position::Object,
            Position::Object => Position::Subject,
            Position::Relation => Position::Relation,
        }
    }

    /// Subject and object, in that order.
    pub const ARGUMENTS: [Position; 2] = [Position::Subject, Position::Object];
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Subject => write!(f, "subject"),
            Position::Relation => write!(f, "relation"),
            Position::Object => write!(f, "object"),
        }
    }
}

// ---------------------------------------------------------------------------
// Triple pattern
// ---------------------------------------------------------------------------

/// A `(subject, relation, object)` template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Term,
    pub relation: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: impl Into<Term>, relation: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    pub fn get(&self, position: Position) -> Term {
        match position {
            Position::Subject => self.subject,
            Position::Relation => self.relation,
            Position::Object => self.object,
        }
    }

    pub fn set(&mut self, position: Position, term: Term) {
        match position {
            Position::Subject => self.subject = term,
            Position::Relation => self.relation = term,
            Position::Object => self.object = term,
        }
    }

    /// Copy of this pattern with `position` replaced.
    pub fn with(mut self, position: Position, term: impl Into<Term>) -> Self {
        self.set(position, term.into());
        self
    }

    /// The relation constant, if bound.
    pub fn relation_id(&self) -> Option<SymbolId> {
        self.relation.as_const()
    }

    pub fn terms(&self) -> [Term; 3] {
        [self.subject, self.relation, self.object]
    }

    /// Distinct variables in subject, relation, object order.
    pub fn variables(&self) -> Vec<Var> {
        let mut out = Vec::with_capacity(3);
        for term in self.terms() {
            if let Term::Var(v) = term {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }

    pub fn contains_var(&self, var: Var) -> bool {
        self.terms().contains(&Term::Var(var))
    }

    /// Whether the two patterns could match the same fact: same relation
    /// term and, argument-wise, equal terms or at least one variable.
    pub fn unifies_with(&self, other: &TriplePattern) -> bool {
        if self.relation != other.relation {
            return false;
        }
        Position::ARGUMENTS.into_iter().all(|p| {
            let (a, b) = (self.get(p), other.get(p));
            a == b || a.is_var() || b.is_var()
        })
    }
}

impl std::fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.relation, self.object)
    }
}
