//! Multi-tenancy: tenant checks and tenant-qualified document ids.

use std::collections::BTreeSet;

use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How tenants share an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiTenancyStrategy {
    /// Single-tenant index; passing a tenant id is an error.
    #[default]
    None,
    /// Documents carry a tenant discriminator field; every operation
    /// names its tenant.
    Discriminator,
}

impl MultiTenancyStrategy {
    /// Whether documents are tenant-scoped.
    pub fn is_enabled(&self) -> bool {
        matches!(self, MultiTenancyStrategy::Discriminator)
    }

    /// Validate the tenant of an indexer, plan, workspace or search scope.
    pub fn check_tenant(&self, tenant_id: Option<&str>) -> Result<()> {
        match (self, tenant_id) {
            (MultiTenancyStrategy::None, None) => Ok(()),
            (MultiTenancyStrategy::None, Some(tenant)) => Err(Error::tenant(format!(
                "Tenant '{tenant}' given but multi-tenancy is not enabled"
            ))),
            (MultiTenancyStrategy::Discriminator, None) => Err(Error::tenant(
                "Multi-tenancy is enabled but no tenant id was given",
            )),
            (MultiTenancyStrategy::Discriminator, Some(tenant)) if tenant.trim().is_empty() => {
                Err(Error::tenant("Tenant id must not be blank"))
            }
            (MultiTenancyStrategy::Discriminator, Some(_)) => Ok(()),
        }
    }

    /// Validate the tenants of an operation spanning several tenants.
    ///
    /// An empty set targets every tenant.
    pub fn check_tenants(&self, tenant_ids: &BTreeSet<String>) -> Result<()> {
        if !self.is_enabled() {
            if let Some(tenant) = tenant_ids.iter().next() {
                return Err(Error::tenant(format!(
                    "Tenant '{tenant}' given but multi-tenancy is not enabled"
                )));
            }
            return Ok(());
        }
        tenant_ids
            .iter()
            .try_for_each(|tenant| self.check_tenant(Some(tenant)))
    }

    /// Backend document id for an entity id.
    pub fn document_id(&self, tenant_id: Option<&str>, entity_id: &str) -> String {
        match (self, tenant_id) {
            (MultiTenancyStrategy::Discriminator, Some(tenant)) => format!("{tenant}_{entity_id}"),
            _ => entity_id.to_string(),
        }
    }
}
