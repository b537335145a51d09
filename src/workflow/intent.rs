//! Turns manual-form values and imported spreadsheet rows into canonical
//! entity snapshots, and allocates provisional identifiers.

use std::sync::Arc;

use rand::distributions::Uniform;
use rand::Rng;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::app_scheme::{AppScheme, AppSchemeInput, ServiceStatus};
use crate::models::family::EntityFamily;
use crate::models::question::{QuestionInput, RecommendedQuestion};
use crate::models::timestamp::to_compact_or_empty;

/// Hands out identifiers for entities that do not exist in the store yet.
///
/// The id allocated at proposal time becomes the entity's permanent key once
/// the registration is approved.
pub trait IdAllocator: Send + Sync {
    /// `index` is the entity's position within one submission.
    fn allocate(&self, index: usize) -> String;
}

/// `temp_<unix millis>_<index>_<9 base36 chars>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TempIdAllocator;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

impl IdAllocator for TempIdAllocator {
    fn allocate(&self, index: usize) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let dist = Uniform::from(0..BASE36.len());
        let suffix: String = rand::thread_rng()
            .sample_iter(dist)
            .take(9)
            .map(|i| BASE36[i] as char)
            .collect();
        format!("temp_{}_{}_{}", millis, index, suffix)
    }
}

#[derive(Clone)]
pub struct MutationIntentBuilder {
    allocator: Arc<dyn IdAllocator>,
}

impl Default for MutationIntentBuilder {
    fn default() -> Self {
        Self::new(Arc::new(TempIdAllocator))
    }
}

impl MutationIntentBuilder {
    pub fn new(allocator: Arc<dyn IdAllocator>) -> Self {
        Self { allocator }
    }

    /// Normalizes one raw row. When `id` is `None`, the row's own id is kept,
    /// and a provisional one is allocated if it has none.
    pub fn normalize(
        &self,
        family: EntityFamily,
        raw: &Value,
        id: Option<String>,
    ) -> Result<Value, AppError> {
        let snapshot = match family {
            EntityFamily::AppScheme => {
                let input: AppSchemeInput = parse_row(raw)?;
                let id = id
                    .or_else(|| input.id.clone())
                    .unwrap_or_else(|| self.allocator.allocate(0));
                serde_json::to_value(normalize_app_scheme(input, id))
            }
            EntityFamily::RecommendedQuestions => {
                let input: QuestionInput = parse_row(raw)?;
                let id = id
                    .or_else(|| input.qst_id.clone())
                    .unwrap_or_else(|| self.allocator.allocate(0));
                serde_json::to_value(normalize_question(input, id))
            }
        };
        snapshot.map_err(|e| AppError::Internal(e.into()))
    }

    /// Rows proposed for registration always receive fresh provisional ids,
    /// whatever id the row carried.
    pub fn for_registration(
        &self,
        family: EntityFamily,
        rows: &[Value],
    ) -> Result<Vec<Value>, AppError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let id = self.allocator.allocate(index);
                self.normalize(family, row, Some(id))
            })
            .collect()
    }

    /// A full post-change snapshot of an existing entity.
    pub fn for_modification(
        &self,
        family: EntityFamily,
        id: &str,
        row: &Value,
    ) -> Result<Value, AppError> {
        if id.trim().is_empty() {
            return Err(AppError::InvalidInput("entity id must not be empty".into()));
        }
        self.normalize(family, row, Some(id.to_string()))
    }
}

fn parse_row<T: serde::de::DeserializeOwned>(raw: &Value) -> Result<T, AppError> {
    if !raw.is_object() {
        return Err(AppError::InvalidInput(format!(
            "expected an object row, got {}",
            raw
        )));
    }
    serde_json::from_value(raw.clone()).map_err(|e| AppError::InvalidInput(e.to_string()))
}

pub fn normalize_app_scheme(input: AppSchemeInput, id: String) -> AppScheme {
    AppScheme {
        id,
        product_menu_name: input.product_menu_name.unwrap_or_default(),
        description: input.description.unwrap_or_default(),
        app_scheme_link: input.app_scheme_link.unwrap_or_default(),
        one_link: input.one_link.unwrap_or_default(),
        goods_name_list: input.goods_name_list,
        parent_id: input.parent_id,
        parent_title: input.parent_title,
        start_date: to_compact_or_empty(input.start_date.as_deref()),
        end_date: to_compact_or_empty(input.end_date.as_deref()),
        status: ServiceStatus::parse_or_default(input.status.as_deref()),
    }
}

pub fn normalize_question(input: QuestionInput, qst_id: String) -> RecommendedQuestion {
    RecommendedQuestion {
        qst_id,
        service_nm: input.service_nm.or(input.service_cd).unwrap_or_default(),
        display_ctnt: input.display_ctnt.unwrap_or_default(),
        prompt_ctnt: input.prompt_ctnt,
        qst_ctgr: input.qst_ctgr.unwrap_or_default(),
        qst_style: input.qst_style,
        parent_id: input.parent_id,
        parent_nm: input.parent_nm,
        age_grp: input.age_grp.map(|raw| canonical_number(&raw)),
        show_u17: input
            .show_u17
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| "N".to_string()),
        imp_start_date: to_compact_or_empty(input.imp_start_date.as_deref()),
        imp_end_date: to_compact_or_empty(input.imp_end_date.as_deref()),
        status: ServiceStatus::parse_or_default(input.status.as_deref()),
    }
}

/// `"07"` and `7.0` both become `"7"`; non-numeric text is kept as typed.
fn canonical_number(raw: &str) -> String {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 => format!("{}", n as i64),
        Ok(n) if n.is_finite() => n.to_string(),
        _ => raw.to_string(),
    }
}
