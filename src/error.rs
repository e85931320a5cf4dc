//! Rich diagnostic error types for horn-miner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so users know exactly which rule or
//! store query failed and why.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the miner.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MinerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

/// Malformed-rule errors: a refinement was requested that violates a
/// structural precondition of the rule. These are programmer errors.
#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("operation '{operation}' expects a non-empty rule")]
    #[diagnostic(
        code(horn::rule::empty),
        help("Seed the search with `initial_rules` before refining.")
    )]
    EmptyRule { operation: &'static str },

    #[error("closing atoms need at least two variables, rule '{rule}' has {found}")]
    #[diagnostic(
        code(horn::rule::too_few_variables),
        help("Check `rule.variables().len() >= 2` before asking for closing atoms.")
    )]
    TooFewVariables { rule: String, found: usize },

    #[error("rule '{rule}' already has {max} atoms, the configured maximum")]
    #[diagnostic(
        code(horn::rule::too_long),
        help("Check `is_not_too_long(rule)` before refining; full rules are only scored.")
    )]
    TooLong { rule: String, max: usize },

    #[error("the last atom of rule '{rule}' has no fresh variable to instantiate")]
    #[diagnostic(
        code(horn::rule::no_fresh_variable),
        help("Only children of the dangling operator can be instantiated.")
    )]
    NoFreshVariable { rule: String },

    #[error("position {position} of the last atom of rule '{rule}' is not a variable")]
    #[diagnostic(
        code(horn::rule::not_a_variable),
        help("Constants can only replace variables; this atom is already bound there.")
    )]
    NotAVariable { rule: String, position: String },

    #[error("rule '{rule}' would lose its counting variable")]
    #[diagnostic(
        code(horn::rule::counting_variable),
        help("The functional (counting) variable of the head can never be bound to a constant.")
    )]
    CountingVariable { rule: String },

    #[error("rule '{rule}' does not end in a type atom with a class constant")]
    #[diagnostic(
        code(horn::rule::no_type_atom),
        help("Type specialization narrows `rdf:type(x, C)`; add the type atom first.")
    )]
    NoTypeAtom { rule: String },

    #[error("atom '{atom}' has an unbound relation")]
    #[diagnostic(
        code(horn::rule::unbound_relation),
        help("Resolve the relation variable to a constant before adding the atom.")
    )]
    UnboundRelation { atom: String },

    #[error("atom '{atom}' shares no variable with rule '{rule}'")]
    #[diagnostic(
        code(horn::rule::disconnected),
        help("Refinements must join on at least one existing variable.")
    )]
    Disconnected { atom: String, rule: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors reported by a [`FactStore`](crate::store::FactStore) implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("unsupported counting operation: {message}")]
    #[diagnostic(
        code(horn::store::unsupported),
        help(
            "The store cannot evaluate this pattern shape. Optional metrics \
             (standard and PCA confidence) are left unset when this happens."
        )
    )]
    Unsupported { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(horn::store::io),
        help("A filesystem operation failed while reading facts. Check the path and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("malformed fact at line {line}: {message}")]
    #[diagnostic(
        code(horn::store::corrupt),
        help("Fact files are tab-separated `subject<TAB>relation<TAB>object` lines.")
    )]
    Corrupt { line: usize, message: String },
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("operator '{operator}' depends on '{dependency}', which is not in the pipeline")]
    #[diagnostic(
        code(horn::pipeline::unknown_dependency),
        help("Add the dependency to the operator list or drop the dependent operator.")
    )]
    UnknownDependency {
        operator: String,
        dependency: String,
    },

    #[error("operator dependencies form a cycle")]
    #[diagnostic(
        code(horn::pipeline::cycle),
        help("An operator can only consume output of operators that run before it.")
    )]
    Cycle,

    #[error("operator '{operator}' appears more than once")]
    #[diagnostic(
        code(horn::pipeline::duplicate),
        help("Each operator runs at most once per refinement.")
    )]
    Duplicate { operator: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    #[diagnostic(
        code(horn::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(horn::config::parse),
        help("The mining config is TOML; see `MiningConfig` for the accepted keys.")
    )]
    Parse { path: String, message: String },

    #[error("invalid config: {message}")]
    #[diagnostic(
        code(horn::config::invalid),
        help("Confidence thresholds lie in [0, 1] and rules need room for at least two atoms.")
    )]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Symbol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SymbolError {
    #[error("symbol ID space exhausted")]
    #[diagnostic(
        code(horn::symbol::exhausted),
        help("The symbol table handed out 2^64 - 1 ids. Intern fewer labels.")
    )]
    AllocatorExhausted,
}

/// Convenience result type for miner operations.
pub type MinerResult<T> = std::result::Result<T, MinerError>;

/// Result type for rule construction.
pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// Result type for fact-store queries.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
