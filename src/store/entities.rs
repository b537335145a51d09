use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::http::StoreClient;
use super::EntityMutator;
use crate::errors::AppError;
use crate::models::collection;
use crate::models::family::FamilyDescriptor;

/// Entity mutations for one family over the document store.
///
/// Creates and deletes go through a single multi-path write; updates are one
/// PUT per entity, issued sequentially in list order.
pub struct HttpEntityMutator {
    store: StoreClient,
    family: FamilyDescriptor,
}

impl HttpEntityMutator {
    pub fn new(store: StoreClient, family: FamilyDescriptor) -> Self {
        Self { store, family }
    }

    fn ids_of<'a>(&self, items: &'a [Value]) -> Vec<&'a str> {
        items
            .iter()
            .filter_map(|item| {
                let id = self.family.entity_id(item);
                if id.is_none() {
                    warn!(family = %self.family.family, "snapshot without id skipped");
                }
                id
            })
            .collect()
    }
}

#[async_trait]
impl EntityMutator for HttpEntityMutator {
    async fn create_many(&self, items: &[Value]) -> Result<(), AppError> {
        if items.is_empty() {
            debug!(family = %self.family.family, "create_many: nothing to create");
            return Ok(());
        }

        let mut updates = Map::new();
        for item in items {
            let id = self.family.entity_id(item).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "{} snapshot has no '{}'",
                    self.family.family, self.family.id_field
                ))
            })?;
            updates.insert(self.family.entity_path(id), item.clone());
        }

        self.store.multi_path_update(&updates).await?;
        info!(family = %self.family.family, count = updates.len(), "entities created");
        Ok(())
    }

    async fn update_many(&self, items: &[Value]) -> Result<(), AppError> {
        let mut updated = 0usize;
        for item in items {
            let Some(id) = self.family.entity_id(item) else {
                warn!(family = %self.family.family, "update skipped: snapshot without id");
                continue;
            };
            self.store.put_json(&self.family.entity_path(id), item).await?;
            debug!(family = %self.family.family, id, "entity updated");
            updated += 1;
        }
        info!(family = %self.family.family, count = updated, "entities updated");
        Ok(())
    }

    async fn delete_many(&self, items: &[Value]) -> Result<(), AppError> {
        let ids = self.ids_of(items);
        if ids.is_empty() {
            warn!(family = %self.family.family, "delete_many: no valid ids");
            return Ok(());
        }

        let updates: Map<String, Value> = ids
            .iter()
            .map(|id| (self.family.entity_path(id), Value::Null))
            .collect();

        self.store.multi_path_update(&updates).await?;
        info!(family = %self.family.family, count = updates.len(), "entities deleted");
        Ok(())
    }

    async fn fetch_one(&self, id: &str) -> Result<Value, AppError> {
        let mut value = self.store.get_json(&self.family.entity_path(id)).await?;
        if value.is_null() {
            return Err(AppError::EntityNotFound(format!("{}/{}", self.family.family, id)));
        }
        // Records written by the older tooling do not embed their own id.
        if let Value::Object(map) = &mut value {
            map.entry(self.family.id_field.to_string())
                .or_insert_with(|| Value::String(id.to_string()));
        }
        Ok(value)
    }

    async fn list(&self) -> Result<Vec<Value>, AppError> {
        let raw = self.store.get_json(self.family.data_path).await?;
        Ok(collection::entries(raw)
            .into_iter()
            .map(|entry| {
                let mut value = entry.value;
                if let Value::Object(map) = &mut value {
                    map.entry(self.family.id_field.to_string())
                        .or_insert(Value::String(entry.key));
                }
                value
            })
            .collect())
    }
}
