//! The adapter seam: one implementation per source kind, looked up by tag.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use coverage_processor::{Interpolation, Scanner};
use geo_common::{Geometry, Notification, ObservableKind, ValueType};
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};
use crate::params::ResourceParameters;

/// A data source as the host describes it: which adapter reads it and the
/// parameters that adapter needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub adapter: String,
    #[serde(default)]
    pub parameters: ResourceParameters,
}

impl Resource {
    pub fn new(adapter: impl Into<String>, parameters: ResourceParameters) -> Self {
        Self {
            adapter: adapter.into(),
            parameters,
        }
    }
}

/// What the caller wants the resource contextualized to.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    /// Target scale. Shared so equal requests can reuse cached coverages.
    pub geometry: Arc<Geometry>,
    pub observable: ObservableKind,
    /// Per-request interpolation, overriding the resource's.
    pub interpolation: Option<String>,
}

impl ContextRequest {
    pub fn new(geometry: Arc<Geometry>, observable: ObservableKind) -> Self {
        Self {
            geometry,
            observable,
            interpolation: None,
        }
    }

    pub fn with_interpolation(mut self, interpolation: impl Into<String>) -> Self {
        self.interpolation = Some(interpolation.into());
        self
    }

    /// Kernel for `resource` under this request.
    pub fn interpolation_for(&self, resource: &Resource) -> Result<Interpolation> {
        resource
            .parameters
            .interpolation(self.interpolation.as_deref(), &self.observable)
    }
}

/// Fetch, type inference and validation for one source kind.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Tag resources use to select this adapter.
    fn kind(&self) -> &'static str;

    /// Write the resource's values on the request grid into `scanner`.
    async fn encode(
        &self,
        resource: &Resource,
        request: &ContextRequest,
        scanner: &mut (dyn Scanner + Send),
    ) -> Result<()>;

    /// Type of the values the resource produces.
    async fn value_type(&self, resource: &Resource) -> Result<ValueType>;

    /// Check a resource before it is used. Returns an info notification on
    /// success.
    async fn validate(&self, resource: &Resource) -> Result<Notification>;
}

/// Adapters by tag. Lookup ignores case.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ResourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter, replacing any registered under the same tag.
    pub fn register(&mut self, adapter: Arc<dyn ResourceAdapter>) {
        self.adapters.insert(adapter.kind().to_lowercase(), adapter);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn ResourceAdapter>> {
        self.adapters
            .get(&kind.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| AdapterError::UnknownAdapter(kind.to_string()))
    }

    /// Registered tags, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.adapters.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    #[async_trait]
    impl ResourceAdapter for Constant {
        fn kind(&self) -> &'static str {
            "constant"
        }

        async fn encode(
            &self,
            _resource: &Resource,
            _request: &ContextRequest,
            scanner: &mut (dyn Scanner + Send),
        ) -> Result<()> {
            scanner.set(0, 1.0);
            Ok(())
        }

        async fn value_type(&self, _resource: &Resource) -> Result<ValueType> {
            Ok(ValueType::Number)
        }

        async fn validate(&self, _resource: &Resource) -> Result<Notification> {
            Ok(Notification::info("ok"))
        }
    }

    #[test]
    fn test_lookup_ignores_case() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Constant));

        assert_eq!(registry.get("CONSTANT").unwrap().kind(), "constant");
        assert_eq!(registry.get(" constant ").unwrap().kind(), "constant");
        assert_eq!(registry.kinds(), vec!["constant".to_string()]);
    }

    #[test]
    fn test_unknown_adapter() {
        let registry = AdapterRegistry::new();
        let err = registry.get("vector").err().unwrap();
        assert_eq!(err.to_string(), "No adapter registered for 'vector'");
    }

    #[test]
    fn test_resource_from_yaml() {
        let resource: Resource = serde_yaml::from_str(
            "adapter: wcs\nparameters:\n  serviceUrl: https://example.org/ows\n  wcsVersion: 2.0.1\n  nodata: -9999\n",
        )
        .unwrap();
        assert_eq!(resource.adapter, "wcs");
        assert_eq!(
            resource.parameters.get_str("serviceurl").as_deref(),
            Some("https://example.org/ows")
        );
        assert_eq!(resource.parameters.nodata().unwrap(), Some(-9999.0));
    }
}
