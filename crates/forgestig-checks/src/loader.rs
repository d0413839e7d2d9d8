//! Rule loader - loads rule definitions from files

use crate::{parse_rule_yaml, RuleRegistry};
use forgestig_core::{Error, Result, Rule};
use std::path::Path;
use tracing::{debug, info, warn};

/// Load all rules from a directory tree
pub fn load_rules_from_dir(dir: impl AsRef<Path>) -> Result<RuleRegistry> {
    let dir = dir.as_ref();
    let mut registry = RuleRegistry::new();

    if !dir.exists() {
        return Err(Error::FileNotFound {
            path: dir.display().to_string(),
        });
    }

    info!("Loading rules from: {}", dir.display());
    load_recursive(&mut registry, dir)?;

    info!("Loaded {} rules", registry.len());
    Ok(registry)
}

fn load_recursive(registry: &mut RuleRegistry, dir: &Path) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            load_recursive(registry, &path)?;
        } else if let Some(ext) = path.extension() {
            if ext == "yaml" || ext == "yml" {
                match load_yaml_rule(&path) {
                    Ok(rule) => {
                        debug!("Loaded rule: {} from {}", rule.id, path.display());
                        registry.register(rule);
                    }
                    Err(e) => {
                        warn!("Failed to load rule from {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    Ok(())
}

fn load_yaml_rule(path: &Path) -> Result<Rule> {
    let content = std::fs::read_to_string(path)?;

    parse_rule_yaml(&content).map_err(|e| Error::InvalidRuleDefinition {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
