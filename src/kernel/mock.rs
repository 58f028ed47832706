// Stateful in-memory kernel tables for tests

use std::collections::HashSet;
use std::sync::Mutex;

use super::{KernelTables, RuleSpec};
use crate::error::{AppError, AppResult};
use crate::routes::Route;
use crate::rules::Rule;

/// A mutation the reconciler asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Add(RuleSpec),
    Del(RuleSpec),
}

/// Records every mutation and applies it to its own rule list, so a
/// rescan sees the result of the previous sync.
#[derive(Default)]
pub struct MockKernel {
    routes: Mutex<Vec<Route>>,
    rules: Mutex<Vec<Rule>>,
    ops: Mutex<Vec<Op>>,
    fail_route_list: bool,
    fail_rule_list: bool,
    rejected_sources: HashSet<String>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(self, routes: Vec<Route>) -> Self {
        *self.routes.lock().unwrap() = routes;
        self
    }

    pub fn with_rules(self, rules: Vec<Rule>) -> Self {
        *self.rules.lock().unwrap() = rules;
        self
    }

    /// Existing rules in `table`, one per source
    pub fn with_table_rules(self, table: u32, sources: &[&str]) -> Self {
        let rules = sources
            .iter()
            .map(|source| Rule {
                priority: Some(5),
                source: Some(source.to_string()),
                source_len: None,
                table: Some(table),
            })
            .collect();
        self.with_rules(rules)
    }

    pub fn failing_route_list(mut self) -> Self {
        self.fail_route_list = true;
        self
    }

    pub fn failing_rule_list(mut self) -> Self {
        self.fail_rule_list = true;
        self
    }

    /// Make add/del for `source` fail as if the kernel refused it
    pub fn rejecting(mut self, source: &str) -> Self {
        self.rejected_sources.insert(source.to_string());
        self
    }

    pub fn set_routes(&self, routes: Vec<Route>) {
        *self.routes.lock().unwrap() = routes;
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn additions(&self) -> Vec<RuleSpec> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Add(rule) => Some(rule),
                Op::Del(_) => None,
            })
            .collect()
    }

    pub fn deletions(&self) -> Vec<RuleSpec> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Del(rule) => Some(rule),
                Op::Add(_) => None,
            })
            .collect()
    }

    fn check_rejected(&self, rule: &RuleSpec) -> AppResult<()> {
        if self.rejected_sources.contains(&rule.source.to_string()) {
            return Err(AppError::CommandFailed {
                command: format!("ip -4 rule {}", rule),
                status: "exit status: 2".to_string(),
                stderr: "RTNETLINK answers: Operation not permitted".to_string(),
            });
        }
        Ok(())
    }
}

impl KernelTables for MockKernel {
    fn list_routes(&self) -> AppResult<Vec<Route>> {
        if self.fail_route_list {
            return Err(AppError::CommandFailed {
                command: "ip -json -4 route show".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "permission denied".to_string(),
            });
        }
        Ok(self.routes.lock().unwrap().clone())
    }

    fn list_rules(&self) -> AppResult<Vec<Rule>> {
        if self.fail_rule_list {
            return Err(AppError::CommandFailed {
                command: "ip -json -4 rule show".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "permission denied".to_string(),
            });
        }
        Ok(self.rules.lock().unwrap().clone())
    }

    fn add_rule(&self, rule: &RuleSpec) -> AppResult<()> {
        self.ops.lock().unwrap().push(Op::Add(rule.clone()));
        self.check_rejected(rule)?;

        self.rules.lock().unwrap().push(Rule {
            priority: rule.priority,
            source: Some(rule.source.to_string()),
            source_len: None,
            table: Some(rule.table),
        });
        Ok(())
    }

    fn del_rule(&self, rule: &RuleSpec) -> AppResult<()> {
        self.ops.lock().unwrap().push(Op::Del(rule.clone()));
        self.check_rejected(rule)?;

        let source = rule.source.to_string();
        let mut rules = self.rules.lock().unwrap();
        let position = rules.iter().position(|r| {
            r.table == Some(rule.table) && r.source_id().as_deref() == Some(source.as_str())
        });

        match position {
            Some(index) => {
                rules.remove(index);
                Ok(())
            }
            None => Err(AppError::CommandFailed {
                command: format!("ip -4 rule del {}", rule),
                status: "exit status: 2".to_string(),
                stderr: "RTNETLINK answers: No such file or directory".to_string(),
            }),
        }
    }
}
