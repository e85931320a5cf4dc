//! # horn-miner
//!
//! Horn rule mining over incomplete knowledge bases.
//!
//! ## Architecture
//!
//! - **Rules** (`rule`): candidate rules, their statistics and the id-indexed lineage arena
//! - **Fact store** (`store`): the aggregate query contract plus an indexed in-memory store
//! - **Mining** (`mining`): refinement operators, support and confidence, pruning by
//!   bounds and approximations, and the dominance (skyline) output test
//! - **Schema** (`schema`): the class hierarchy used by type specialization
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use horn_miner::mining::MiningAssistant;
//! use horn_miner::mining::config::MiningConfig;
//! use horn_miner::mining::dominance::DominanceIndex;
//! use horn_miner::rule::RuleArena;
//! use horn_miner::store::MemStore;
//! use horn_miner::symbol::SymbolTable;
//!
//! let symbols = SymbolTable::new();
//! let store = MemStore::load_tsv("facts.tsv".as_ref(), &symbols).unwrap();
//! let assistant = MiningAssistant::new(Arc::new(store), MiningConfig::default(), &symbols).unwrap();
//!
//! let (arena, index) = (RuleArena::new(), DominanceIndex::new());
//! for seed in assistant.initial_rules(2).unwrap() {
//!     let seed = assistant.evaluate(seed, &arena, &index).unwrap().rule;
//!     for child in assistant.run_pipeline(&seed, 2).unwrap() {
//!         let evaluation = assistant.evaluate(child, &arena, &index).unwrap();
//!         println!("{:?} {}", evaluation.state, evaluation.rule.render(&symbols));
//!     }
//! }
//! ```

pub mod error;
pub mod mining;
pub mod rule;
pub mod schema;
pub mod store;
pub mod symbol;

pub use error::{MinerError, MinerResult};
pub use mining::MiningAssistant;
pub use rule::{CandidateState, Rule, RuleArena};
