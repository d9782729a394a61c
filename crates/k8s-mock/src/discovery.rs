//! Resource types the mock server advertises.

use std::collections::BTreeMap;

/// Discovery data: core (`v1`) resources plus resources per group version.
pub struct MockDiscovery {
	pub core_resources: Vec<MockApiResource>,
	pub group_resources: BTreeMap<String, Vec<MockApiResource>>,
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			core_resources: vec![
				MockApiResource::namespaced("configmaps", "ConfigMap"),
				MockApiResource::namespaced("secrets", "Secret"),
				MockApiResource::namespaced("services", "Service"),
				MockApiResource::cluster_scoped("namespaces", "Namespace"),
			],
			group_resources: BTreeMap::from([
				(
					"apps/v1".to_string(),
					vec![
						MockApiResource::namespaced("deployments", "Deployment"),
						MockApiResource::namespaced("statefulsets", "StatefulSet"),
					],
				),
				(
					"rbac.authorization.k8s.io/v1".to_string(),
					vec![MockApiResource::cluster_scoped("clusterroles", "ClusterRole")],
				),
			]),
		}
	}
}

impl MockDiscovery {
	/// Find a resource by apiVersion and kind.
	pub fn find(&self, api_version: &str, kind: &str) -> Option<&MockApiResource> {
		let resources = if api_version.contains('/') {
			self.group_resources.get(api_version)?
		} else if api_version == "v1" {
			&self.core_resources
		} else {
			return None;
		};
		resources.iter().find(|r| r.kind == kind)
	}
}

/// One advertised resource type.
pub struct MockApiResource {
	/// Plural name used in URL paths.
	pub name: String,
	pub kind: String,
	pub namespaced: bool,
}

impl MockApiResource {
	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced: true,
		}
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced: false,
		}
	}

	pub(crate) fn to_api_resource_json(&self) -> serde_json::Value {
		serde_json::json!({
			"name": self.name,
			"singularName": "",
			"namespaced": self.namespaced,
			"kind": self.kind,
			"verbs": ["get", "list"],
		})
	}
}
