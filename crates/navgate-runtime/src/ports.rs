//! Blackboard and port remapping.
//!
//! Nodes read their configuration through named *ports*.  A [`PortMap`]
//! binds each port either to a literal value or, BT-style, to a blackboard
//! entry written as `"{key}"`:
//!
//! ```rust
//! use navgate_runtime::ports::{Blackboard, PortMap};
//!
//! let mut bb = Blackboard::new();
//! bb.set("goal_x", 2.5).unwrap();
//!
//! let ports = PortMap::new()
//!     .with("x", "{goal_x}")
//!     .with("y", "3.0")
//!     .with("tf_frame", "");
//!
//! assert_eq!(ports.input::<f64>("x", &bb).unwrap(), Some(2.5));
//! assert_eq!(ports.input::<f64>("y", &bb).unwrap(), Some(3.0));
//! assert_eq!(ports.input::<String>("tf_frame", &bb).unwrap(), Some(String::new()));
//! assert_eq!(ports.input::<f64>("distance_tolerance", &bb).unwrap(), None);
//! ```
//!
//! Literal strings that look like JSON scalars (`"3.0"`, `"true"`) are
//! accepted for numeric and boolean ports, matching how tree descriptions
//! spell every attribute as text.

use std::collections::HashMap;

use navgate_types::NavError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared key/value store the nodes of one tree read and write.
#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    entries: HashMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), NavError> {
        let value = serde_json::to_value(value).map_err(|e| NavError::Port {
            port: key.to_string(),
            details: format!("cannot encode value: {e}"),
        })?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Read `key` as a `T`.  `Ok(None)` when the entry is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, NavError> {
        self.entries.get(key).map(|value| decode(key, value)).transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Port bindings of one node instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortMap {
    bindings: HashMap<String, Value>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `port` to `value`.  A string of the form `"{key}"` binds the
    /// port to blackboard entry `key`.
    pub fn with(mut self, port: &str, value: impl Into<Value>) -> Self {
        self.bindings.insert(port.to_string(), value.into());
        self
    }

    /// Read input `port`.  `Ok(None)` when the port is unbound or bound to a
    /// blackboard entry that does not exist yet.
    pub fn input<T: DeserializeOwned>(&self, port: &str, blackboard: &Blackboard) -> Result<Option<T>, NavError> {
        match self.bindings.get(port) {
            None => Ok(None),
            Some(binding) => match blackboard_key(binding) {
                Some(key) => blackboard.get(key),
                None => decode(port, binding).map(Some),
            },
        }
    }

    /// Read input `port`, falling back to `default` when it has no value.
    pub fn input_or<T: DeserializeOwned>(&self, port: &str, blackboard: &Blackboard, default: T) -> Result<T, NavError> {
        Ok(self.input(port, blackboard)?.unwrap_or(default))
    }

    /// Write output `port`.  The value lands in the remapped blackboard entry
    /// or, when the port is not remapped, in the entry named after the port.
    pub fn output<T: Serialize>(&self, port: &str, blackboard: &mut Blackboard, value: T) -> Result<(), NavError> {
        let key = self.bindings.get(port).and_then(blackboard_key).unwrap_or(port);
        blackboard.set(key, value)
    }
}

fn blackboard_key(binding: &Value) -> Option<&str> {
    binding
        .as_str()
        .and_then(|s| s.strip_prefix('{'))
        .and_then(|s| s.strip_suffix('}'))
        .filter(|key| !key.is_empty())
}

fn decode<T: DeserializeOwned>(port: &str, value: &Value) -> Result<T, NavError> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(first) => value
            .as_str()
            .and_then(|text| serde_json::from_str::<T>(text).ok())
            .ok_or_else(|| NavError::Port {
                port: port.to_string(),
                details: first.to_string(),
            }),
    }
}
