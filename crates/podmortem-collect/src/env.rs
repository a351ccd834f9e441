//! Declared-environment collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use podmortem_core::{EnvValue, FROM_SOURCE};

use crate::api::PodApi;
use crate::error::Result;

/// Reads the declared environment of a container from the pod spec.
///
/// Literal `name=value` pairs are copied as-is; values arriving through
/// indirection (secretRef, configMapRef, fieldRef) are recorded as the
/// [`FROM_SOURCE`] sentinel rather than resolved, keeping the observer's
/// permission surface at read-pod.
pub struct EnvCollector {
    api: Arc<dyn PodApi>,
}

impl EnvCollector {
    /// Creates an env collector.
    #[must_use]
    pub fn new(api: Arc<dyn PodApi>) -> Self {
        Self { api }
    }

    /// Environment of the named container; empty when the container is not
    /// declared in the pod spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod spec cannot be read.
    pub async fn for_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<BTreeMap<String, String>> {
        let spec = self.api.pod_spec(namespace, pod).await?;

        let mut env_vars = BTreeMap::new();
        if let Some(spec) = spec.containers.iter().find(|c| c.name == container) {
            for var in &spec.env {
                match &var.value {
                    EnvValue::Literal(value) if !value.is_empty() => {
                        env_vars.insert(var.name.clone(), value.clone());
                    }
                    EnvValue::Literal(_) => {}
                    EnvValue::FromSource(_) => {
                        env_vars.insert(var.name.clone(), FROM_SOURCE.to_string());
                    }
                }
            }
        }

        Ok(env_vars)
    }
}
