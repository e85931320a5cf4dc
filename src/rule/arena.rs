//! Shared registry of published rules.
//!
//! Rules refer to their ancestors by [`RuleId`] rather than by pointer, so the
//! lineage graph lives here. Concurrent workers insert and read through a
//! `DashMap`. A published `Arc<Rule>` is never mutated: extra parents are
//! linked before a candidate is inserted.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{Rule, RuleId};

#[derive(Debug, Default)]
pub struct RuleArena {
    rules: DashMap<RuleId, Arc<Rule>>,
    next: AtomicU64,
}

impl RuleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an id to `rule` and publish it.
    pub fn insert(&self, mut rule: Rule) -> Arc<Rule> {
        let id = RuleId(self.next.fetch_add(1, Ordering::Relaxed));
        rule.set_id(id);
        let rule = Arc::new(rule);
        self.rules.insert(id, Arc::clone(&rule));
        rule
    }

    pub fn get(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule reachable through parent links, nearest first, without
    /// duplicates. Works for unpublished candidates too.
    pub fn ancestors(&self, rule: &Rule) -> Vec<Arc<Rule>> {
        let mut seen: HashSet<RuleId> = rule.id().into_iter().collect();
        let mut queue: VecDeque<RuleId> = rule.parents().iter().copied().collect();
        let mut out = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let Some(ancestor) = self.get(id) else {
                continue;
            };
            queue.extend(ancestor.parents().iter().copied());
            out.push(ancestor);
        }
        out
    }
}
