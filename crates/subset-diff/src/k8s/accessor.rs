//! [`ClusterAccessor`] backed by a real API server.

use kube::{api::DynamicObject, discovery::ApiResource, Api};
use serde_json::Value;
use tracing::instrument;

use super::{
	client::{ClusterAccessor, ClusterConnection, ClusterError},
	discovery::ApiResourceCache,
	ResourceScope,
};
use crate::manifest::Object;

pub struct KubeAccessor {
	connection: ClusterConnection,
	cache: ApiResourceCache,
}

impl KubeAccessor {
	pub fn new(connection: ClusterConnection) -> Self {
		let cache = ApiResourceCache::new(connection.client().clone());
		Self { connection, cache }
	}

	pub fn connection(&self) -> &ClusterConnection {
		&self.connection
	}

	fn dynamic_api(&self, ar: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
		let client = self.connection.client().clone();
		match namespace {
			Some(ns) => Api::namespaced_with(client, ns, ar),
			None => Api::all_with(client, ar),
		}
	}
}

impl ClusterAccessor for KubeAccessor {
	#[instrument(skip(self), fields(cluster = %self.connection.cluster_identifier()))]
	async fn get(
		&self,
		namespace: Option<&str>,
		kind: &str,
		name: &str,
	) -> Result<Object, ClusterError> {
		let discovered = self.cache.resolve(kind).await?;

		let namespace = match discovered.scope {
			ResourceScope::Namespaced => {
				Some(namespace.unwrap_or_else(|| self.connection.default_namespace()))
			}
			ResourceScope::ClusterWide => None,
		};

		let found = self
			.dynamic_api(&discovered.api_resource, namespace)
			.get_opt(name)
			.await
			.map_err(|e| ClusterError::Request {
				kind: kind.to_string(),
				name: name.to_string(),
				source: Box::new(e),
			})?;

		let Some(object) = found else {
			return Err(ClusterError::NotFound {
				kind: kind.to_string(),
				name: name.to_string(),
			});
		};

		let decode = |source| ClusterError::Decode {
			kind: kind.to_string(),
			name: name.to_string(),
			source,
		};
		match serde_json::to_value(object).map_err(decode)? {
			Value::Object(object) => Ok(object),
			_ => Err(decode(serde::ser::Error::custom("object did not serialize to a map"))),
		}
	}
}
