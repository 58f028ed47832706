//! Access to the kernel routing and policy rule tables.
//!
//! The reconciliation core only talks to the kernel through [`KernelTables`].
//! Production code uses [`IpCommand`], which drives iproute2. `--dry-run`
//! wraps it in [`DryRun`]. Tests use the recording mock in `mock`.

pub mod ip;
#[cfg(test)]
pub mod mock;

use ipnet::Ipv4Net;
use std::fmt;

use crate::error::AppResult;
use crate::routes::Route;
use crate::rules::Rule;

pub use ip::IpCommand;

/// An IPv4 source rule to add to or delete from the kernel.
///
/// `priority` is `None` for deletions, which match on family, table and
/// source only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub source: Ipv4Net,
    pub table: u32,
    pub priority: Option<u32>,
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} table {}", self.source, self.table)?;
        if let Some(priority) = self.priority {
            write!(f, " priority {}", priority)?;
        }
        Ok(())
    }
}

/// Read and write access to the IPv4 routing and rule tables
pub trait KernelTables: Send + Sync {
    /// List the IPv4 routes of the main table
    fn list_routes(&self) -> AppResult<Vec<Route>>;

    /// List all IPv4 policy rules
    fn list_rules(&self) -> AppResult<Vec<Rule>>;

    fn add_rule(&self, rule: &RuleSpec) -> AppResult<()>;

    fn del_rule(&self, rule: &RuleSpec) -> AppResult<()>;
}

/// Reads from the wrapped tables, logs mutations instead of applying them
pub struct DryRun<K> {
    inner: K,
}

impl<K: KernelTables> DryRun<K> {
    pub fn new(inner: K) -> Self {
        DryRun { inner }
    }
}

impl<K: KernelTables> KernelTables for DryRun<K> {
    fn list_routes(&self) -> AppResult<Vec<Route>> {
        self.inner.list_routes()
    }

    fn list_rules(&self) -> AppResult<Vec<Rule>> {
        self.inner.list_rules()
    }

    fn add_rule(&self, rule: &RuleSpec) -> AppResult<()> {
        tracing::info!("[dry-run] would add rule {}", rule);
        Ok(())
    }

    fn del_rule(&self, rule: &RuleSpec) -> AppResult<()> {
        tracing::info!("[dry-run] would delete rule {}", rule);
        Ok(())
    }
}
