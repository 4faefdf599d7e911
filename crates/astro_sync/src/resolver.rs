//! Conflict resolution for writes the server rejected with a conflict

use crate::queue::SyncQueueItem;
use crate::strategy::ConflictResolution;
use serde_json::{Map, Value};

/// A queued write the server refused, with the server's current body if it sent one
#[derive(Debug, Clone)]
pub struct Conflict {
    pub item: SyncQueueItem,
    pub server_data: Option<Value>,
}

/// How a conflict is settled
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Drop the local write
    KeepServer,
    /// Resend the local write unchanged
    KeepClient,
    /// Resend this payload instead
    Merged(Value),
    /// Leave the item queued for the user to decide
    Deferred,
}

/// Per-data-type override of the strategy's conflict policy
pub trait ConflictHandler: Send + Sync {
    fn resolve(&self, conflict: &Conflict) -> Resolution;
}

impl<F> ConflictHandler for F
where
    F: Fn(&Conflict) -> Resolution + Send + Sync,
{
    fn resolve(&self, conflict: &Conflict) -> Resolution {
        self(conflict)
    }
}

/// Applies a strategy's [`ConflictResolution`]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn resolve(policy: ConflictResolution, conflict: &Conflict) -> Resolution {
        match policy {
            ConflictResolution::Server => Resolution::KeepServer,
            ConflictResolution::Client => Resolution::KeepClient,
            ConflictResolution::Prompt => Resolution::Deferred,
            ConflictResolution::Merge => Resolution::Merged(shallow_merge(
                conflict.server_data.as_ref(),
                conflict.item.data.as_ref(),
            )),
        }
    }
}

/// Top-level merge: local fields overwrite server fields.
///
/// When either side is not an object the local value wins if present.
pub fn shallow_merge(server: Option<&Value>, local: Option<&Value>) -> Value {
    match (server, local) {
        (Some(Value::Object(server)), Some(Value::Object(local))) => {
            let mut merged: Map<String, Value> = server.clone();
            for (key, value) in local {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, Some(local)) => local.clone(),
        (Some(server), None) => server.clone(),
        (None, None) => Value::Null,
    }
}
