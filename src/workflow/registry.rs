use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::family::{ApplyPolicy, EntityFamily, FamilyDescriptor};
use crate::store::approvals::HttpApprovalRepository;
use crate::store::entities::HttpEntityMutator;
use crate::store::http::StoreClient;
use crate::store::{ApprovalRepository, EntityMutator};

use super::transition::StatusTransitioner;

/// Everything the workflow needs to act on one entity family.
#[derive(Clone)]
pub struct FamilyBundle {
    pub descriptor: FamilyDescriptor,
    pub policy: ApplyPolicy,
    pub mutator: Arc<dyn EntityMutator>,
    pub repository: Arc<dyn ApprovalRepository>,
}

impl FamilyBundle {
    pub fn transitioner(&self) -> StatusTransitioner {
        StatusTransitioner::new(self.repository.clone())
    }

    /// Approval of this family's requests only records the decision.
    pub fn is_audit_only(&self) -> bool {
        self.policy == ApplyPolicy::Immediate
    }
}

/// Family bundles resolved once at startup.
#[derive(Clone, Default)]
pub struct FamilyRegistry {
    bundles: HashMap<EntityFamily, FamilyBundle>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bundle: FamilyBundle) {
        self.bundles.insert(bundle.descriptor.family, bundle);
    }

    pub fn get(&self, family: EntityFamily) -> Result<&FamilyBundle, AppError> {
        self.bundles
            .get(&family)
            .ok_or_else(|| AppError::UnknownFamily(family.to_string()))
    }

    /// Resolves a path segment such as `app-scheme`.
    pub fn lookup(&self, key: &str) -> Result<&FamilyBundle, AppError> {
        let family: EntityFamily = key
            .parse()
            .map_err(|_| AppError::UnknownFamily(key.to_string()))?;
        self.get(family)
    }

    pub fn families(&self) -> Vec<EntityFamily> {
        let mut out: Vec<EntityFamily> = self.bundles.keys().copied().collect();
        out.sort_by_key(|f| f.as_str());
        out
    }

    /// Registers every known family against one store, each with the policy
    /// looked up from `policies` (default: deferred).
    pub fn from_store(store: &StoreClient, policies: &HashMap<EntityFamily, ApplyPolicy>) -> Self {
        let mut registry = Self::new();
        for family in EntityFamily::ALL {
            let descriptor = family.descriptor();
            registry.register(FamilyBundle {
                descriptor,
                policy: policies.get(&family).copied().unwrap_or_default(),
                mutator: Arc::new(HttpEntityMutator::new(store.clone(), descriptor)),
                repository: Arc::new(HttpApprovalRepository::new(store.clone(), descriptor)),
            });
        }
        registry
    }
}
