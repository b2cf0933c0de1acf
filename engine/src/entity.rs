//! Entity and operation kind tags for queued mutations.
//!
//! Every queued operation targets one entity kind with one operation kind.
//! The valid pairs are defined by the payload schema set and the handler
//! registry, both of which are keyed by these tags.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The domain object class a queued mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Lead,
    Task,
    Target,
    FollowUp,
    VoiceRemark,
    LeadAction,
}

impl EntityKind {
    /// All entity kinds, in declaration order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Lead,
        EntityKind::Task,
        EntityKind::Target,
        EntityKind::FollowUp,
        EntityKind::VoiceRemark,
        EntityKind::LeadAction,
    ];

    /// Stable string tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Lead => "lead",
            EntityKind::Task => "task",
            EntityKind::Target => "target",
            EntityKind::FollowUp => "follow_up",
            EntityKind::VoiceRemark => "voice_remark",
            EntityKind::LeadAction => "lead_action",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownEntity(s.to_string()))
    }
}

/// The kind of mutation within an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Complete,
    AddRemark,
}

impl OperationKind {
    /// All operation kinds, in declaration order.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Create,
        OperationKind::Update,
        OperationKind::Complete,
        OperationKind::AddRemark,
    ];

    /// Stable string tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Complete => "complete",
            OperationKind::AddRemark => "add_remark",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_tags_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn operation_tags_roundtrip() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(matches!(
            "invoice".parse::<EntityKind>(),
            Err(Error::UnknownEntity(e)) if e == "invoice"
        ));
        assert!(matches!(
            "destroy".parse::<OperationKind>(),
            Err(Error::UnknownOperation(o)) if o == "destroy"
        ));
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&EntityKind::FollowUp).unwrap();
        assert_eq!(json, "\"follow_up\"");

        let json = serde_json::to_string(&OperationKind::AddRemark).unwrap();
        assert_eq!(json, "\"add_remark\"");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(EntityKind::VoiceRemark.to_string(), "voice_remark");
        assert_eq!(OperationKind::Complete.to_string(), "complete");
    }
}
