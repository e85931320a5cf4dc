//! horn-miner CLI: mine Horn rules from a tab-separated fact file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rayon::prelude::*;
use serde::Serialize;

use horn_miner::mining::MiningAssistant;
use horn_miner::mining::config::MiningConfig;
use horn_miner::mining::dominance::DominanceIndex;
use horn_miner::rule::{Rule, RuleArena, TriplePattern};
use horn_miner::schema::TypeHierarchy;
use horn_miner::store::MemStore;
use horn_miner::symbol::SymbolTable;

#[derive(Parser)]
#[command(name = "horn-miner", version, about = "Horn rule mining over incomplete knowledge bases")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine rules from a fact file.
    Mine {
        /// Facts as `subject<TAB>relation<TAB>object` lines.
        #[arg(long)]
        facts: PathBuf,

        /// TOML mining configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Minimum support of every produced rule.
        #[arg(long, default_value = "2")]
        min_support: u64,

        /// Specialize type atoms along `rdfs:subClassOf` facts of the file.
        #[arg(long)]
        types: bool,

        /// Print emitted rules as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show relation sizes of a fact file.
    Stats {
        /// Facts as `subject<TAB>relation<TAB>object` lines.
        #[arg(long)]
        facts: PathBuf,
    },
}

/// One emitted rule as printed by `mine --json`.
#[derive(Serialize)]
struct RuleReport {
    rule: String,
    support: u64,
    head_coverage: Option<f64>,
    std_confidence: Option<f64>,
    pca_confidence: Option<f64>,
    std_confidence_upper_bound: Option<f64>,
    pca_confidence_upper_bound: Option<f64>,
    pca_estimation: Option<f64>,
}

impl RuleReport {
    fn new(rule: &Rule, symbols: &SymbolTable) -> Self {
        Self {
            rule: rule.render(symbols),
            support: rule.support(),
            head_coverage: rule.head_coverage(),
            std_confidence: rule.std_confidence(),
            pca_confidence: rule.pca_confidence(),
            std_confidence_upper_bound: rule.std_confidence_upper_bound(),
            pca_confidence_upper_bound: rule.pca_confidence_upper_bound(),
            pca_estimation: rule.pca_estimation(),
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mine {
            facts,
            config,
            min_support,
            types,
            json,
        } => {
            let config = match config {
                Some(path) => MiningConfig::load(&path)?,
                None => MiningConfig::default(),
            };
            let symbols = SymbolTable::new();
            let assistant = open(&facts, config, &symbols, types)?;
            let index = mine(&assistant, min_support)?;
            let emitted = index.emitted();

            if json {
                let reports: Vec<RuleReport> = emitted
                    .iter()
                    .map(|r| RuleReport::new(r, &symbols))
                    .collect();
                let out = serde_json::to_string_pretty(&reports).into_diagnostic()?;
                println!("{out}");
            } else {
                println!("Rule\tHead Coverage\tStd Confidence\tPCA Confidence\tSupport");
                for rule in &emitted {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        rule.render(&symbols),
                        fmt_ratio(rule.head_coverage()),
                        fmt_ratio(rule.std_confidence()),
                        fmt_ratio(rule.pca_confidence()),
                        rule.support()
                    );
                }
                println!("{} rules mined.", emitted.len());
            }
        }

        Commands::Stats { facts } => {
            let symbols = SymbolTable::new();
            let assistant = open(&facts, MiningConfig::default(), &symbols, false)?;
            let snapshot = assistant.snapshot();
            println!("Facts: {}", snapshot.fact_count());
            for (relation, size) in snapshot.relations_by_size() {
                println!("  {:<32} {size}", symbols.label(relation));
            }
        }
    }

    Ok(())
}

fn fmt_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn open(
    facts: &Path,
    config: MiningConfig,
    symbols: &SymbolTable,
    types: bool,
) -> Result<MiningAssistant> {
    let store = MemStore::load_tsv(facts, symbols)?;
    let hierarchy = if types {
        Some(TypeHierarchy::from_store(&store)?)
    } else {
        None
    };
    let mut assistant = MiningAssistant::new(Arc::new(store), config, symbols)?;
    if let Some(hierarchy) = hierarchy {
        assistant = assistant.with_hierarchy(hierarchy);
    }
    Ok(assistant)
}

/// Head plus body in a fixed order; two derivations of the same rule with
/// the same variable numbering share it.
fn dedup_key(rule: &Rule) -> Vec<TriplePattern> {
    let mut body = rule.body().to_vec();
    body.sort_by_cached_key(|atom| atom.to_string());
    let mut key = vec![*rule.head()];
    key.extend(body);
    key
}

/// Breadth-first search: refine every rule of a level in parallel, evaluate
/// the children and keep them all as the next level.
fn mine(assistant: &MiningAssistant, min_support: u64) -> Result<DominanceIndex> {
    let arena = RuleArena::new();
    let index = DominanceIndex::new();
    let seen: Mutex<HashSet<Vec<TriplePattern>>> = Mutex::new(HashSet::new());

    let mut frontier = Vec::new();
    for seed in assistant.initial_rules(min_support)? {
        frontier.push(assistant.evaluate(seed, &arena, &index)?.rule);
    }
    tracing::info!(seeds = frontier.len(), "mining started");

    let mut depth = 1;
    while !frontier.is_empty() {
        frontier = frontier
            .par_iter()
            .filter(|rule| assistant.is_not_too_long(rule))
            .flat_map_iter(|rule| {
                let children = match assistant.run_pipeline(rule, min_support) {
                    Ok(children) => children,
                    Err(e) => {
                        tracing::warn!(rule = %rule, error = %e, "refinement failed");
                        Vec::new()
                    }
                };
                children
                    .into_iter()
                    .filter(|child| {
                        seen.lock()
                            .expect("search dedup lock poisoned")
                            .insert(dedup_key(child))
                    })
                    .filter_map(|child| match assistant.evaluate(child, &arena, &index) {
                        Ok(evaluation) => Some(evaluation.rule),
                        Err(e) => {
                            tracing::warn!(error = %e, "evaluation failed");
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        depth += 1;
        tracing::info!(
            depth,
            candidates = frontier.len(),
            emitted = index.len(),
            "level refined"
        );
    }

    tracing::info!(rules = arena.len(), emitted = index.len(), "mining finished");
    Ok(index)
}
