// Rules module - policy rule listing and the rule scanner

pub mod parser;

use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::kernel::KernelTables;
use crate::network::{network_id, NetworkId};

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub priority: Option<u32>,
    pub source: Option<String>, // None for `from all`
    pub source_len: Option<u8>,
    pub table: Option<u32>,
}

impl Rule {
    /// Source network of the rule, if it has one that parses
    pub fn source_id(&self) -> Option<NetworkId> {
        network_id(self.source.as_deref()?, self.source_len)
    }
}

/// Collect the sources of every IPv4 rule that points at `target_table`.
///
/// Rules without a source (`from all`) never match. A failed listing is
/// returned as `AppError::RuleScan`.
pub fn scan_rules(kernel: &dyn KernelTables, target_table: u32) -> AppResult<HashSet<NetworkId>> {
    let rules = kernel.list_rules().map_err(|e| {
        tracing::error!("Got error when fetching rule list: {}", e);
        AppError::RuleScan(e.to_string())
    })?;

    let mut matching = HashSet::new();

    for rule in rules.iter().filter(|rule| rule.table == Some(target_table)) {
        let Some(id) = rule.source_id() else {
            continue;
        };

        match rule.priority {
            Some(priority) => tracing::debug!("Rule {} priority {} matches", id, priority),
            None => tracing::debug!("Rule {} matches", id),
        }
        matching.insert(id);
    }

    Ok(matching)
}
