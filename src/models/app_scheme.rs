use serde::{Deserialize, Serialize};

use super::loose;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    InService,
    OutOfService,
}

impl ServiceStatus {
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()) {
            Some(s) if s == "out_of_service" => ServiceStatus::OutOfService,
            _ => ServiceStatus::InService,
        }
    }
}

/// Canonical app-scheme link record, stored under `data-reg/app-scheme/<id>`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AppScheme {
    pub id: String,
    pub product_menu_name: String,
    pub description: String,
    pub app_scheme_link: String,
    pub one_link: String,
    pub goods_name_list: Option<String>,
    pub parent_id: Option<String>,
    pub parent_title: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub status: ServiceStatus,
}

/// An app-scheme row as typed into the manual form or read from a spreadsheet.
/// Accepts both camelCase and snake_case keys.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AppSchemeInput {
    #[serde(deserialize_with = "loose::string")]
    pub id: Option<String>,
    #[serde(alias = "productMenuName", deserialize_with = "loose::string")]
    pub product_menu_name: Option<String>,
    #[serde(deserialize_with = "loose::string")]
    pub description: Option<String>,
    #[serde(alias = "appSchemeLink", deserialize_with = "loose::string")]
    pub app_scheme_link: Option<String>,
    #[serde(alias = "oneLink", deserialize_with = "loose::string")]
    pub one_link: Option<String>,
    #[serde(alias = "goodsNameList", deserialize_with = "loose::string")]
    pub goods_name_list: Option<String>,
    #[serde(alias = "parentId", deserialize_with = "loose::string")]
    pub parent_id: Option<String>,
    #[serde(alias = "parentTitle", deserialize_with = "loose::string")]
    pub parent_title: Option<String>,
    #[serde(alias = "startDate", deserialize_with = "loose::string")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate", deserialize_with = "loose::string")]
    pub end_date: Option<String>,
    #[serde(deserialize_with = "loose::string")]
    pub status: Option<String>,
}
