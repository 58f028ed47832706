// Parsers for `ip rule show` output

use std::collections::HashMap;
use std::path::Path;

use super::Rule;
use crate::error::{AppError, AppResult};

/// iproute2 table name files, later entries override earlier ones
const RT_TABLES_FILES: &[&str] = &["/usr/share/iproute2/rt_tables", "/etc/iproute2/rt_tables"];
const RT_TABLES_DIRS: &[&str] = &["/usr/share/iproute2/rt_tables.d", "/etc/iproute2/rt_tables.d"];

/// Routing table names as iproute2 prints them, mapped to table ids
#[derive(Debug, Clone)]
pub struct TableNames {
    names: HashMap<String, u32>,
}

impl Default for TableNames {
    fn default() -> Self {
        let names = [("default", 253), ("main", 254), ("local", 255)]
            .into_iter()
            .map(|(name, id)| (name.to_string(), id))
            .collect();
        TableNames { names }
    }
}

impl TableNames {
    /// Reserved names plus everything in the system `rt_tables` files
    pub fn load() -> Self {
        let mut names = TableNames::default();

        for file in RT_TABLES_FILES {
            names.extend_from_file(Path::new(file));
        }

        for dir in RT_TABLES_DIRS {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut files: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "conf"))
                .collect();
            files.sort();

            for file in files {
                names.extend_from_file(&file);
            }
        }

        names
    }

    fn extend_from_file(&mut self, path: &Path) {
        if let Ok(content) = std::fs::read_to_string(path) {
            self.extend_from(&content);
        }
    }

    /// Add `<id> <name>` lines in `rt_tables` format; ids may be hex (`0x..`)
    pub fn extend_from(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(id), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };

            let id = match id.strip_prefix("0x") {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => id.parse().ok(),
            };

            match id {
                Some(id) => {
                    self.names.insert(name.to_string(), id);
                }
                None => tracing::debug!("Ignoring malformed rt_tables line '{}'", line),
            }
        }
    }

    /// Resolve a table as printed by iproute2, either a number or a name
    pub fn resolve(&self, table: &str) -> Option<u32> {
        table
            .parse()
            .ok()
            .or_else(|| self.names.get(table).copied())
    }
}

/// Parse JSON output from `ip -json -4 rule show`
pub fn parse_rule_json(json_str: &str, tables: &TableNames) -> AppResult<Vec<Rule>> {
    if json_str.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rules: Vec<serde_json::Value> = serde_json::from_str(json_str)?;

    let parsed = rules
        .iter()
        .map(|rule| {
            let source = rule
                .get("src")
                .and_then(|v| v.as_str())
                .filter(|src| *src != "all")
                .map(String::from);

            let source_len = rule
                .get("srclen")
                .and_then(|v| v.as_u64())
                .and_then(|len| u8::try_from(len).ok());

            let table = match rule.get("table") {
                Some(serde_json::Value::String(name)) => {
                    let id = tables.resolve(name);
                    if id.is_none() {
                        tracing::debug!("Unknown routing table name '{}'", name);
                    }
                    id
                }
                Some(value) => value.as_u64().and_then(|id| u32::try_from(id).ok()),
                None => None,
            };

            let priority = rule
                .get("priority")
                .and_then(|v| v.as_u64())
                .and_then(|p| u32::try_from(p).ok());

            Rule {
                priority,
                source,
                source_len,
                table,
            }
        })
        .collect();

    Ok(parsed)
}

/// Parse plain output from `ip -4 rule show`
pub fn parse_rule_text(output: &str, tables: &TableNames) -> AppResult<Vec<Rule>> {
    let mut rules = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            continue;
        };

        let priority = first
            .strip_suffix(':')
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| AppError::OutputParse(format!("missing priority in '{}'", line)))?;

        let mut source = None;
        let mut table = None;

        let mut i = 1;
        while i < parts.len() {
            match (parts[i], parts.get(i + 1).copied()) {
                ("from", Some(src)) => {
                    if src != "all" {
                        source = Some(src.to_string());
                    }
                    i += 2;
                }
                ("lookup", Some(name)) | ("table", Some(name)) => {
                    table = tables.resolve(name);
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }

        rules.push(Rule {
            priority: Some(priority),
            source,
            source_len: None,
            table,
        });
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE_JSON: &str = r#"[
        {"priority":0,"src":"all","table":"local"},
        {"priority":5,"src":"10.0.1.0","srclen":24,"table":"200"},
        {"priority":5,"src":"10.0.9.9","table":"200"},
        {"priority":32766,"src":"all","table":"main"},
        {"priority":32767,"src":"all","table":"default"}
    ]"#;

    const RT_TABLES: &str = "#\n\
                             # reserved values\n\
                             #\n\
                             255\tlocal\n\
                             254\tmain\n\
                             253\tdefault\n\
                             0\tunspec\n\
                             200 vpn\n\
                             0xc9\tbackup\n\
                             bogus line\n";

    fn named_tables() -> TableNames {
        let mut tables = TableNames::default();
        tables.extend_from(RT_TABLES);
        tables
    }

    #[test]
    fn test_table_names_builtin() {
        let tables = TableNames::default();
        assert_eq!(tables.resolve("main"), Some(254));
        assert_eq!(tables.resolve("local"), Some(255));
        assert_eq!(tables.resolve("default"), Some(253));
        assert_eq!(tables.resolve("200"), Some(200));
        assert_eq!(tables.resolve("vpn"), None);
    }

    #[test]
    fn test_table_names_from_rt_tables() {
        let tables = named_tables();
        assert_eq!(tables.resolve("vpn"), Some(200));
        assert_eq!(tables.resolve("backup"), Some(201));
        assert_eq!(tables.resolve("unspec"), Some(0));
        assert_eq!(tables.resolve("line"), None);
    }

    #[test]
    fn test_parse_rule_json_named_table() {
        let json = r#"[{"priority":5,"src":"10.0.1.0","srclen":24,"table":"vpn"}]"#;

        let rules = parse_rule_json(json, &named_tables()).unwrap();
        assert_eq!(rules[0].table, Some(200));

        // without the name mapping the table stays unknown
        let rules = parse_rule_json(json, &TableNames::default()).unwrap();
        assert_eq!(rules[0].table, None);
    }

    #[test]
    fn test_parse_rule_text_named_table() {
        let rules = parse_rule_text("5:\tfrom 10.0.1.0/24 lookup vpn\n", &named_tables()).unwrap();

        assert_eq!(rules[0].table, Some(200));
        assert_eq!(rules[0].source_id().as_deref(), Some("10.0.1.0/24"));
    }

    #[test]
    fn test_parse_rule_json() {
        let rules = parse_rule_json(RULE_JSON, &TableNames::default()).unwrap();
        assert_eq!(rules.len(), 5);

        assert_eq!(rules[0].source, None);
        assert_eq!(rules[0].table, Some(255));

        assert_eq!(rules[1].priority, Some(5));
        assert_eq!(rules[1].source.as_deref(), Some("10.0.1.0"));
        assert_eq!(rules[1].source_len, Some(24));
        assert_eq!(rules[1].table, Some(200));
        assert_eq!(rules[1].source_id().as_deref(), Some("10.0.1.0/24"));

        assert_eq!(rules[2].source_id().as_deref(), Some("10.0.9.9/32"));
        assert_eq!(rules[3].table, Some(254));
    }

    #[test]
    fn test_parse_rule_json_empty_output() {
        assert!(parse_rule_json("\n", &TableNames::default()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rule_text() {
        let output = "0:\tfrom all lookup local\n\
                      5:\tfrom 10.0.1.0/24 lookup 200\n\
                      32766:\tfrom all lookup main\n";

        let rules = parse_rule_text(output, &TableNames::default()).unwrap();
        assert_eq!(rules.len(), 3);

        assert_eq!(rules[0].source, None);
        assert_eq!(rules[1].priority, Some(5));
        assert_eq!(rules[1].source_id().as_deref(), Some("10.0.1.0/24"));
        assert_eq!(rules[1].table, Some(200));
        assert_eq!(rules[2].table, Some(254));
    }

    #[test]
    fn test_parse_rule_text_rejects_missing_priority() {
        assert!(parse_rule_text("from all lookup main", &TableNames::default()).is_err());
    }
}
