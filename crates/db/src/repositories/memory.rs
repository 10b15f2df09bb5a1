use std::collections::HashMap;

use tokio::sync::RwLock;

use vitral_core::domain::catalog::{GlassType, GlassTypeId, Model, ModelId, Service, ServiceId};

use super::{CatalogRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    models: RwLock<HashMap<String, Model>>,
    glass_types: RwLock<HashMap<String, GlassType>>,
    services: RwLock<HashMap<String, Service>>,
}

impl InMemoryCatalogRepository {
    pub async fn save_model(&self, model: Model) {
        self.models.write().await.insert(model.id.0.clone(), model);
    }

    pub async fn save_glass_type(&self, glass: GlassType) {
        self.glass_types.write().await.insert(glass.id.0.clone(), glass);
    }

    pub async fn save_service(&self, service: Service) {
        self.services.write().await.insert(service.id.0.clone(), service);
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn find_model(&self, id: &ModelId) -> Result<Option<Model>, RepositoryError> {
        let models = self.models.read().await;
        Ok(models.get(&id.0).cloned())
    }

    async fn find_glass_type(
        &self,
        id: &GlassTypeId,
    ) -> Result<Option<GlassType>, RepositoryError> {
        let glass_types = self.glass_types.read().await;
        Ok(glass_types.get(&id.0).cloned())
    }

    async fn find_services(&self, ids: &[ServiceId]) -> Result<Vec<Service>, RepositoryError> {
        let services = self.services.read().await;
        let mut found: Vec<Service> =
            ids.iter().filter_map(|id| services.get(&id.0).cloned()).collect();
        found.sort_by(|left, right| left.id.cmp(&right.id));
        found.dedup_by(|left, right| left.id == right.id);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use vitral_core::domain::catalog::{MeasureUnit, Service, ServiceId, ServiceType};

    use super::InMemoryCatalogRepository;
    use crate::repositories::CatalogRepository;

    #[tokio::test]
    async fn duplicate_service_ids_resolve_once() {
        let repo = InMemoryCatalogRepository::default();
        repo.save_service(Service {
            id: ServiceId("svc-sellado".to_string()),
            name: "Sellado perimetral".to_string(),
            service_type: ServiceType::Perimeter,
            unit: MeasureUnit::Ml,
            rate: Decimal::new(350, 2),
            minimum_billing_unit: Decimal::new(2, 0),
        })
        .await;

        let id = ServiceId("svc-sellado".to_string());
        let services = repo.find_services(&[id.clone(), id]).await.expect("lookup");

        assert_eq!(services.len(), 1);
    }
}
