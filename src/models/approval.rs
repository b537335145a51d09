use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::collection;
use super::timestamp::CompactTimestamp;

/// Which entity operation approving a request triggers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalForm {
    DataRegistration,
    DataModification,
    DataDeletion,
}

impl ApprovalForm {
    pub const ALL: [ApprovalForm; 3] = [
        ApprovalForm::DataRegistration,
        ApprovalForm::DataModification,
        ApprovalForm::DataDeletion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalForm::DataRegistration => "data_registration",
            ApprovalForm::DataModification => "data_modification",
            ApprovalForm::DataDeletion => "data_deletion",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ApprovalForm::DataRegistration => "Data registration",
            ApprovalForm::DataModification => "Data modification",
            ApprovalForm::DataDeletion => "Data deletion",
        }
    }

    pub fn content(&self, label: &str) -> String {
        let verb = match self {
            ApprovalForm::DataRegistration => "registration",
            ApprovalForm::DataModification => "modification",
            ApprovalForm::DataDeletion => "deletion",
        };
        format!("{} {}", label, verb)
    }

    pub fn initial_status(&self) -> ApprovalStatus {
        match self {
            ApprovalForm::DataRegistration => ApprovalStatus::CreateRequested,
            ApprovalForm::DataModification => ApprovalStatus::UpdateRequested,
            ApprovalForm::DataDeletion => ApprovalStatus::DeleteRequested,
        }
    }
}

impl fmt::Display for ApprovalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // CREATE/UPDATE/DELETE are the request kinds written by the older backend.
        match s.trim() {
            "data_registration" | "CREATE" => Ok(ApprovalForm::DataRegistration),
            "data_modification" | "UPDATE" => Ok(ApprovalForm::DataModification),
            "data_deletion" | "DELETE" => Ok(ApprovalForm::DataDeletion),
            other => Err(format!("unknown approval_form: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    CreateRequested,
    UpdateRequested,
    DeleteRequested,
    InReview,
    DoneReview,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::CreateRequested => "create_requested",
            ApprovalStatus::UpdateRequested => "update_requested",
            ApprovalStatus::DeleteRequested => "delete_requested",
            ApprovalStatus::InReview => "in_review",
            ApprovalStatus::DoneReview => "done_review",
        }
    }

    /// One of the three first-pass states a request is born in.
    pub fn is_requested(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::CreateRequested
                | ApprovalStatus::UpdateRequested
                | ApprovalStatus::DeleteRequested
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::DoneReview)
    }

    /// Forward-only lifecycle. `done_review` has no outgoing edge.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        match (self, next) {
            (from, ApprovalStatus::InReview) => from.is_requested(),
            (from, ApprovalStatus::DoneReview) => {
                from.is_requested() || *from == ApprovalStatus::InReview
            }
            _ => false,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create_requested" => Ok(ApprovalStatus::CreateRequested),
            "update_requested" => Ok(ApprovalStatus::UpdateRequested),
            "delete_requested" => Ok(ApprovalStatus::DeleteRequested),
            "in_review" => Ok(ApprovalStatus::InReview),
            "done_review" => Ok(ApprovalStatus::DoneReview),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// A persisted approval request as read back from the repository.
///
/// Reads are lenient: unknown `approval_form`/`status` strings become `None`
/// instead of failing the whole review queue, and the field names used by the
/// older backend are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "requestKind", deserialize_with = "lenient_parse")]
    pub approval_form: Option<ApprovalForm>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_timestamp")]
    pub request_date: Option<CompactTimestamp>,
    #[serde(default, alias = "approvalStatus", deserialize_with = "lenient_parse")]
    pub status: Option<ApprovalStatus>,
    #[serde(default, alias = "updatedAt", deserialize_with = "lenient_timestamp")]
    pub process_date: Option<CompactTimestamp>,
    #[serde(default, alias = "targetType", skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, alias = "targetId", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, deserialize_with = "snapshot_list")]
    pub list: Vec<Value>,
}

impl ApprovalRequest {
    /// Whether the first-pass approval action may pick this request.
    pub fn is_selectable(&self) -> bool {
        matches!(self.status, Some(s) if s.is_requested())
    }
}

/// The record the submitter posts; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewApprovalRequest {
    pub approval_form: ApprovalForm,
    pub title: String,
    pub content: String,
    pub request_date: CompactTimestamp,
    pub status: ApprovalStatus,
    pub target_type: String,
    pub target_id: String,
    pub list: Vec<Value>,
}

/// Body of the status PATCH. `process_date` is only sent with `done_review`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPatch {
    pub status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_date: Option<CompactTimestamp>,
}

fn lenient_parse<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<CompactTimestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => CompactTimestamp::parse_loose(&s),
        Some(Value::Number(n)) => CompactTimestamp::parse_loose(&n.to_string()),
        _ => None,
    })
}

fn snapshot_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.map(collection::values).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_status_follows_form() {
        assert_eq!(
            ApprovalForm::DataRegistration.initial_status(),
            ApprovalStatus::CreateRequested
        );
        assert_eq!(
            ApprovalForm::DataModification.initial_status(),
            ApprovalStatus::UpdateRequested
        );
        assert_eq!(
            ApprovalForm::DataDeletion.initial_status(),
            ApprovalStatus::DeleteRequested
        );
    }

    #[test]
    fn test_transition_table() {
        use ApprovalStatus::*;
        for from in [CreateRequested, UpdateRequested, DeleteRequested] {
            assert!(from.can_transition_to(DoneReview));
            assert!(from.can_transition_to(InReview));
            assert!(!from.can_transition_to(CreateRequested));
        }
        assert!(InReview.can_transition_to(DoneReview));
        assert!(!InReview.can_transition_to(InReview));
        for next in [CreateRequested, UpdateRequested, DeleteRequested, InReview, DoneReview] {
            assert!(!DoneReview.can_transition_to(next), "done_review -> {}", next);
        }
    }

    #[test]
    fn test_title_and_content_lookup() {
        assert_eq!(ApprovalForm::DataDeletion.title(), "Data deletion");
        assert_eq!(
            ApprovalForm::DataRegistration.content("App scheme"),
            "App scheme registration"
        );
    }

    #[test]
    fn test_request_reads_legacy_field_names() {
        let req: ApprovalRequest = serde_json::from_value(json!({
            "requestKind": "UPDATE",
            "approvalStatus": "in_review",
            "createdAt": "20250616143000",
            "list": {"0": {"id": "a"}}
        }))
        .unwrap();
        assert_eq!(req.approval_form, Some(ApprovalForm::DataModification));
        assert_eq!(req.status, Some(ApprovalStatus::InReview));
        assert_eq!(req.request_date.unwrap().to_string(), "20250616143000");
        assert_eq!(req.list, vec![json!({"id": "a"})]);
        assert!(!req.is_selectable());
    }

    #[test]
    fn test_unknown_form_and_status_do_not_fail_the_read() {
        let req: ApprovalRequest = serde_json::from_value(json!({
            "approval_form": "bulk_rename",
            "status": "request",
            "process_date": ""
        }))
        .unwrap();
        assert!(req.approval_form.is_none());
        assert!(req.status.is_none());
        assert!(req.process_date.is_none());
        assert!(req.list.is_empty());
    }

    #[test]
    fn test_status_patch_omits_missing_process_date() {
        let patch = StatusPatch {
            status: ApprovalStatus::InReview,
            process_date: None,
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"status": "in_review"}));
    }
}
