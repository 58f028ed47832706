// iproute2-backed kernel table access

use std::process::Command;

use super::{KernelTables, RuleSpec};
use crate::error::{AppError, AppResult};
use crate::routes::{parser as route_parser, Route};
use crate::rules::parser::{self as rule_parser, TableNames};
use crate::rules::Rule;

/// Drives the `ip` utility to read routes and rules and to change rules
#[derive(Debug, Clone)]
pub struct IpCommand {
    program: String,
}

impl IpCommand {
    pub fn new(program: impl Into<String>) -> Self {
        IpCommand {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String]) -> AppResult<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| AppError::CommandExecution(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(AppError::CommandFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// `-N` makes iproute2 print table ids instead of names from `rt_tables`
const RULE_LIST_JSON: &[&str] = &["-N", "-json", "-4", "rule", "show"];
const RULE_LIST_TEXT: &[&str] = &["-4", "rule", "show"];

/// Arguments for `ip -4 rule add|del from <src> table <t> [priority <p>]`
pub fn rule_args(action: &str, rule: &RuleSpec) -> Vec<String> {
    let mut argv = args(&["-4", "rule", action, "from"]);
    argv.push(rule.source.to_string());
    argv.push("table".to_string());
    argv.push(rule.table.to_string());

    if let Some(priority) = rule.priority {
        argv.push("priority".to_string());
        argv.push(priority.to_string());
    }

    argv
}

impl KernelTables for IpCommand {
    fn list_routes(&self) -> AppResult<Vec<Route>> {
        // Try `ip -json` first, older iproute2 builds lack it
        match self.run(&args(&["-json", "-4", "route", "show"])) {
            Ok(stdout) => route_parser::parse_ip_json(&stdout),
            Err(e) => {
                tracing::debug!("ip -json route show failed, falling back to text: {}", e);
                let stdout = self.run(&args(&["-4", "route", "show"]))?;
                route_parser::parse_ip_route(&stdout)
            }
        }
    }

    fn list_rules(&self) -> AppResult<Vec<Rule>> {
        // Names are still resolved for iproute2 builds that ignore or lack `-N`
        let tables = TableNames::load();

        match self.run(&args(RULE_LIST_JSON)) {
            Ok(stdout) => rule_parser::parse_rule_json(&stdout, &tables),
            Err(e) => {
                tracing::debug!("ip -N -json rule show failed, falling back to text: {}", e);
                let stdout = self.run(&args(RULE_LIST_TEXT))?;
                rule_parser::parse_rule_text(&stdout, &tables)
            }
        }
    }

    fn add_rule(&self, rule: &RuleSpec) -> AppResult<()> {
        self.run(&rule_args("add", rule)).map(|_| ())
    }

    fn del_rule(&self, rule: &RuleSpec) -> AppResult<()> {
        self.run(&rule_args("del", rule)).map(|_| ())
    }
}
