use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a node. Primary keys are global across scopes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub u128);

impl NodeId {
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(NodeId(u128::from_be_bytes(arr)))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single attribute value. Used for scope tuples and for host-provided ordering columns.
///
/// The derived ordering puts `Null` first, matching how the SQL adapters sort nulls.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Ordered attribute tuple partitioning the store into independent forests.
///
/// The empty tuple is the single scope of an unscoped tree.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scope(pub Vec<Value>);

impl Scope {
    pub fn unscoped() -> Self {
        Self(Vec::new())
    }

    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self(values.into_iter().collect())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Canonical byte key used by adapters that store the tuple in a single column.
    #[cfg(feature = "serde")]
    pub fn to_key(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| crate::Error::Storage(e.to_string()))
    }

    #[cfg(feature = "serde")]
    pub fn from_key(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes)
            .map(Scope)
            .map_err(|e| crate::Error::Storage(e.to_string()))
    }
}

impl From<i64> for Scope {
    fn from(value: i64) -> Self {
        Scope(vec![Value::Int(value)])
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Scope(vec![Value::from(value)])
    }
}
