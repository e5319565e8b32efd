//! Queue entry type and wire codec.

use serde::{Deserialize, Serialize};

use hive_core::types::Placement;

use crate::queue::{DispatchError, DispatchResult};

/// Control messages carried alongside jobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// Stop the drain loop after the current entry.
    Shutdown,
}

/// Everything the dispatch queue carries — a closed set, decoded
/// exhaustively on the consumer side.
///
/// A job serializes as `{"type":"job","kind":...,"target":...,
/// "threads":...,"cost_per_thread":...,"delay_ms":...,"node":...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEntry {
    Job(Placement),
    Control { signal: ControlSignal },
}

impl QueueEntry {
    /// Serialize for the wire.
    pub fn encode(&self) -> DispatchResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a wire entry. Unknown tags and malformed payloads both
    /// land in [`DispatchError::UnknownEntry`].
    pub fn decode(raw: &str) -> DispatchResult<Self> {
        serde_json::from_str(raw).map_err(|e| DispatchError::UnknownEntry(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::types::{OperationKind, OperationRequest};

    fn make_placement() -> Placement {
        Placement {
            request: OperationRequest {
                kind: OperationKind::Weaken,
                target: "target-1".to_string(),
                threads: 8,
                cost_per_thread: 18,
                delay_ms: 200,
            },
            node: "worker-3".to_string(),
        }
    }

    #[test]
    fn job_round_trips() {
        let entry = QueueEntry::Job(make_placement());
        let raw = entry.encode().unwrap();
        let decoded = QueueEntry::decode(&raw).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn job_wire_record_is_flat_and_tagged() {
        let raw = QueueEntry::Job(make_placement()).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["type"], "job");
        assert_eq!(value["kind"], "weaken");
        assert_eq!(value["target"], "target-1");
        assert_eq!(value["threads"], 8);
        assert_eq!(value["delay_ms"], 200);
        assert_eq!(value["node"], "worker-3");
    }

    #[test]
    fn control_round_trips() {
        let entry = QueueEntry::Control {
            signal: ControlSignal::Shutdown,
        };
        let raw = entry.encode().unwrap();
        assert_eq!(QueueEntry::decode(&raw).unwrap(), entry);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let raw = r#"{"type":"teleport","node":"worker-1"}"#;
        let err = QueueEntry::decode(raw).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownEntry(_)));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = QueueEntry::decode("not json at all").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownEntry(_)));
    }
}
