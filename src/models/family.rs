use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The managed datasets that go through the approval gate.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum EntityFamily {
    AppScheme,
    RecommendedQuestions,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 2] = [EntityFamily::AppScheme, EntityFamily::RecommendedQuestions];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityFamily::AppScheme => "app-scheme",
            EntityFamily::RecommendedQuestions => "recommended-questions",
        }
    }

    pub fn descriptor(&self) -> FamilyDescriptor {
        match self {
            EntityFamily::AppScheme => FamilyDescriptor {
                family: *self,
                label: "App scheme",
                data_path: "data-reg/app-scheme",
                approval_path: "approval/app-scheme",
                id_field: "id",
                legacy_id_fields: &["appSchemeId"],
                target_type: "APP",
                grouping: RequestGrouping::PerEntity,
            },
            EntityFamily::RecommendedQuestions => FamilyDescriptor {
                family: *self,
                label: "Recommended question",
                data_path: "data-reg/qst",
                approval_path: "approval/recommended-questions",
                id_field: "qst_id",
                legacy_id_fields: &["qstId"],
                target_type: "RECOMMEND",
                grouping: RequestGrouping::SingleRequest,
            },
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app-scheme" | "app_scheme" => Ok(EntityFamily::AppScheme),
            "recommended-questions" | "recommended_questions" | "qst" => {
                Ok(EntityFamily::RecommendedQuestions)
            }
            other => Err(format!("unknown entity family: {}", other)),
        }
    }
}

/// How one submission is split into approval requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestGrouping {
    /// One request per entity; `target_id` is that entity's id.
    PerEntity,
    /// One request for the whole submission; `target_id` joins the ids with commas.
    SingleRequest,
}

/// When the entity effect of a proposal is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPolicy {
    /// Mutations wait for the bulk approval.
    #[default]
    Deferred,
    /// Mutations are applied at submission; approval only records the review.
    Immediate,
}

impl FromStr for ApplyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deferred" | "defer" => Ok(ApplyPolicy::Deferred),
            "immediate" | "audit_only" | "audit-only" => Ok(ApplyPolicy::Immediate),
            other => Err(format!(
                "invalid apply policy: {} (expected 'deferred' or 'immediate')",
                other
            )),
        }
    }
}

/// Static facts about a family: store paths, id field and request templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDescriptor {
    pub family: EntityFamily,
    pub label: &'static str,
    pub data_path: &'static str,
    pub approval_path: &'static str,
    pub id_field: &'static str,
    /// Id keys found in snapshots written by the older tooling.
    pub legacy_id_fields: &'static [&'static str],
    pub target_type: &'static str,
    pub grouping: RequestGrouping,
}

impl FamilyDescriptor {
    /// Reads the identifier out of an entity snapshot.
    pub fn entity_id<'a>(&self, snapshot: &'a serde_json::Value) -> Option<&'a str> {
        std::iter::once(self.id_field)
            .chain(self.legacy_id_fields.iter().copied())
            .filter_map(|key| snapshot.get(key).and_then(|v| v.as_str()))
            .find(|s| !s.is_empty())
    }

    pub fn entity_path(&self, id: &str) -> String {
        format!("{}/{}", self.data_path, id)
    }
}
