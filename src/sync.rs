// Reconciliation of policy rules against matched routes

use std::collections::HashSet;

use crate::config::TableDefinition;
use crate::error::AppResult;
use crate::kernel::{KernelTables, RuleSpec};
use crate::network::{parse_network_id, NetworkId};
use crate::routes::scan_routes;
use crate::rules::scan_rules;

/// Outcome of one sync, counted per identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn is_converged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.failed == 0
    }
}

/// Identifiers in `left` but not in `right`, sorted so passes log in a stable order
fn missing_from<'a>(
    left: &'a HashSet<NetworkId>,
    right: &'a HashSet<NetworkId>,
) -> Vec<&'a NetworkId> {
    let mut ids: Vec<_> = left.difference(right).collect();
    ids.sort();
    ids
}

/// Create rules for routes that have none and delete rules whose route is gone.
///
/// Every failure is confined to its own identifier: it is logged, counted in
/// `failed`, and the rest of the sync carries on. Additions run before
/// deletions and nothing is rolled back.
pub fn sync_route_rules(
    kernel: &dyn KernelTables,
    routes: &HashSet<NetworkId>,
    rules: &HashSet<NetworkId>,
    target_table: u32,
    rule_priority: u32,
) -> SyncReport {
    let mut report = SyncReport::default();

    for route in missing_from(routes, rules) {
        tracing::info!("Adding rule for {}", route);

        let source = match parse_network_id(route) {
            Ok(net) => net,
            Err(e) => {
                tracing::error!("Error parsing '{}': {}", route, e);
                report.failed += 1;
                continue;
            }
        };

        let rule = RuleSpec {
            source,
            table: target_table,
            priority: Some(rule_priority),
        };

        match kernel.add_rule(&rule) {
            Ok(()) => report.added += 1,
            Err(e) => {
                tracing::error!("Error adding rule {}: {}", rule, e);
                report.failed += 1;
            }
        }
    }

    for rule_id in missing_from(rules, routes) {
        tracing::info!("Removing rule for {}", rule_id);

        let source = match parse_network_id(rule_id) {
            Ok(net) => net,
            Err(e) => {
                tracing::error!("Error parsing '{}': {}", rule_id, e);
                report.failed += 1;
                continue;
            }
        };

        // Rules are deleted by family, table and source; priority is not scanned
        let rule = RuleSpec {
            source,
            table: target_table,
            priority: None,
        };

        match kernel.del_rule(&rule) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                tracing::error!("Error deleting rule {}: {}", rule, e);
                report.failed += 1;
            }
        }
    }

    report
}

/// One reconciliation pass for a single table definition.
///
/// A failed scan aborts the pass before any rule is touched, so an
/// unreadable route table never looks like an empty one.
pub fn run_pass(kernel: &dyn KernelTables, table: &TableDefinition) -> AppResult<SyncReport> {
    tracing::info!("Looking for routes matching table '{}'", table.name);
    let routes = scan_routes(kernel, table.search_next_hop)?;
    tracing::info!("Found {} routes, checking rules", routes.len());

    let rules = scan_rules(kernel, table.target_table)?;
    tracing::info!("Found {} rules", rules.len());

    Ok(sync_route_rules(
        kernel,
        &routes,
        &rules,
        table.target_table,
        table.rule_priority,
    ))
}
