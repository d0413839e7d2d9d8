//! Evaluation context - host-wide state and tunable inputs passed to every rule

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Virtualization systems that are containers rather than full guests
const CONTAINER_SYSTEMS: &[&str] = &[
    "docker",
    "podman",
    "lxc",
    "lxc-libvirt",
    "systemd-nspawn",
    "rkt",
    "openvz",
    "wsl",
    "container-other",
];

/// Detected virtualization of the audited host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Virtualization {
    /// Virtualization system (e.g. "docker", "kvm"); None on bare metal
    pub system: Option<String>,
}

impl Virtualization {
    pub fn bare_metal() -> Self {
        Self { system: None }
    }

    pub fn system(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
        }
    }

    /// Running inside a container
    pub fn is_container(&self) -> bool {
        self.system
            .as_deref()
            .map(|s| CONTAINER_SYSTEMS.contains(&s))
            .unwrap_or(false)
    }
}

/// Named tunable parameters referenced by rules (e.g. `maxclassrepeat`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inputs(BTreeMap<String, serde_json::Value>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an input, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Overlay `other` on top of these inputs
    pub fn merge(&mut self, other: &Inputs) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Get a typed input value
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.0.get(name).ok_or_else(|| Error::MissingInput {
            name: name.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidInput {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// Context passed to every rule evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalContext {
    /// Hostname of the audited system
    pub hostname: Option<String>,
    /// Detected virtualization, resolved once per audit run
    pub virtualization: Virtualization,
    /// Tunable inputs
    pub inputs: Inputs,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_virtualization(mut self, virtualization: Virtualization) -> Self {
        self.virtualization = virtualization;
        self
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_detection() {
        assert!(Virtualization::system("docker").is_container());
        assert!(Virtualization::system("podman").is_container());
        assert!(!Virtualization::system("kvm").is_container());
        assert!(!Virtualization::bare_metal().is_container());
    }

    #[test]
    fn test_typed_inputs() {
        let inputs = Inputs::new()
            .with("maxclassrepeat", 4)
            .with("authoritative_timeservers", serde_json::json!(["0.us.pool.ntp.mil"]));

        assert_eq!(inputs.get::<i64>("maxclassrepeat").unwrap(), 4);
        assert_eq!(
            inputs.get::<Vec<String>>("authoritative_timeservers").unwrap(),
            vec!["0.us.pool.ntp.mil".to_string()]
        );
        assert!(matches!(
            inputs.get::<i64>("missing"),
            Err(Error::MissingInput { .. })
        ));
        assert!(matches!(
            inputs.get::<bool>("maxclassrepeat"),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Inputs::new().with("maxclassrepeat", 4);
        base.merge(&Inputs::new().with("maxclassrepeat", 3));
        assert_eq!(base.get::<i64>("maxclassrepeat").unwrap(), 3);
    }
}
