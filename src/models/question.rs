use serde::{Deserialize, Serialize};

use super::app_scheme::ServiceStatus;
use super::loose;

/// Canonical curated question, stored under `data-reg/qst/<qst_id>`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RecommendedQuestion {
    pub qst_id: String,
    pub service_nm: String,
    pub display_ctnt: String,
    pub prompt_ctnt: Option<String>,
    pub qst_ctgr: String,
    pub qst_style: Option<String>,
    pub parent_id: Option<String>,
    pub parent_nm: Option<String>,
    pub age_grp: Option<String>,
    /// `Y` when the question is shown to users under 17.
    pub show_u17: String,
    pub imp_start_date: String,
    pub imp_end_date: String,
    pub status: ServiceStatus,
}

/// A question row from the manual form or a spreadsheet.
///
/// The form sends `parentId`/`parentIdName`, spreadsheets send
/// `parent_id`/`parent_nm` and sometimes only a service code.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QuestionInput {
    #[serde(alias = "qstId", deserialize_with = "loose::string")]
    pub qst_id: Option<String>,
    #[serde(alias = "serviceNm", deserialize_with = "loose::string")]
    pub service_nm: Option<String>,
    #[serde(alias = "serviceCd", deserialize_with = "loose::string")]
    pub service_cd: Option<String>,
    #[serde(alias = "displayCtnt", deserialize_with = "loose::string")]
    pub display_ctnt: Option<String>,
    #[serde(alias = "promptCtnt", deserialize_with = "loose::string")]
    pub prompt_ctnt: Option<String>,
    #[serde(alias = "qstCtgr", deserialize_with = "loose::string")]
    pub qst_ctgr: Option<String>,
    #[serde(alias = "qstStyle", deserialize_with = "loose::string")]
    pub qst_style: Option<String>,
    #[serde(alias = "parentId", deserialize_with = "loose::string")]
    pub parent_id: Option<String>,
    #[serde(alias = "parentIdName", alias = "parentNm", deserialize_with = "loose::string")]
    pub parent_nm: Option<String>,
    #[serde(alias = "ageGrp", deserialize_with = "loose::string")]
    pub age_grp: Option<String>,
    #[serde(
        alias = "showU17",
        alias = "under17Yn",
        alias = "under_17_yn",
        deserialize_with = "loose::string"
    )]
    pub show_u17: Option<String>,
    #[serde(alias = "impStartDate", deserialize_with = "loose::string")]
    pub imp_start_date: Option<String>,
    #[serde(alias = "impEndDate", deserialize_with = "loose::string")]
    pub imp_end_date: Option<String>,
    #[serde(deserialize_with = "loose::string")]
    pub status: Option<String>,
}
