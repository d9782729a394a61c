//! Resolving kinds to API resources.
//!
//! Kinds arrive kubectl style, either qualified (`Deployment.v1.apps`) or
//! bare (`Deployment`). Qualified kinds are resolved with a single pinned
//! discovery call, bare kinds need a full discovery run. Either way the
//! answer is cached for the lifetime of the cache.

use std::collections::HashMap;

use kube::{
	core::GroupVersionKind,
	discovery::{oneshot::pinned_kind, ApiCapabilities, ApiResource, Scope},
	Client, Discovery,
};
use tokio::sync::RwLock;
use tracing::instrument;

use super::{client::ClusterError, ResourceScope};

/// What a kind string asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindQuery {
	/// `Kind.version` or `Kind.version.group`.
	Pinned(GroupVersionKind),
	/// Just `Kind`, resolved against the preferred versions.
	Bare(String),
}

/// Parse a kubectl-style kind.
///
/// The first segment is the kind, the second the version and everything after
/// that the group, which may itself contain dots (`Ingress.v1.networking.k8s.io`).
pub fn parse_kind(kind: &str) -> Result<KindQuery, ClusterError> {
	let invalid = || ClusterError::InvalidKind(kind.to_string());

	let Some((name, rest)) = kind.split_once('.') else {
		if kind.is_empty() {
			return Err(invalid());
		}
		return Ok(KindQuery::Bare(kind.to_string()));
	};

	let (version, group) = rest.split_once('.').unwrap_or((rest, ""));
	if name.is_empty() || version.is_empty() || (rest.contains('.') && group.is_empty()) {
		return Err(invalid());
	}

	Ok(KindQuery::Pinned(GroupVersionKind::gvk(group, version, name)))
}

/// A resolved resource type.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
	pub api_resource: ApiResource,
	pub scope: ResourceScope,
}

impl DiscoveredResource {
	fn new(api_resource: ApiResource, capabilities: &ApiCapabilities) -> Self {
		let scope = match capabilities.scope {
			Scope::Namespaced => ResourceScope::Namespaced,
			Scope::Cluster => ResourceScope::ClusterWide,
		};
		Self {
			api_resource,
			scope,
		}
	}
}

/// Memoized kind lookups against one cluster.
pub struct ApiResourceCache {
	client: Client,
	resources: RwLock<HashMap<String, DiscoveredResource>>,
}

impl ApiResourceCache {
	pub fn new(client: Client) -> Self {
		Self {
			client,
			resources: RwLock::new(HashMap::new()),
		}
	}

	/// Resolve a kind string, asking the cluster only on the first lookup.
	#[instrument(skip(self))]
	pub async fn resolve(&self, kind: &str) -> Result<DiscoveredResource, ClusterError> {
		if let Some(found) = self.resources.read().await.get(kind) {
			return Ok(found.clone());
		}

		let discovered = match parse_kind(kind)? {
			KindQuery::Pinned(gvk) => self.discover_pinned(kind, &gvk).await?,
			KindQuery::Bare(name) => self.discover_bare(&name).await?,
		};

		tracing::debug!(
			api_version = %discovered.api_resource.api_version,
			plural = %discovered.api_resource.plural,
			"discovered resource"
		);
		self.resources
			.write()
			.await
			.insert(kind.to_string(), discovered.clone());
		Ok(discovered)
	}

	async fn discover_pinned(
		&self,
		kind: &str,
		gvk: &GroupVersionKind,
	) -> Result<DiscoveredResource, ClusterError> {
		match pinned_kind(&self.client, gvk).await {
			Ok((api_resource, capabilities)) => {
				Ok(DiscoveredResource::new(api_resource, &capabilities))
			}
			Err(kube::Error::Api(ref err)) if err.code == 404 => {
				Err(ClusterError::UnknownResource {
					api_version: gvk.api_version(),
					kind: gvk.kind.clone(),
				})
			}
			Err(kube::Error::Discovery(_)) => Err(ClusterError::UnknownResource {
				api_version: gvk.api_version(),
				kind: gvk.kind.clone(),
			}),
			Err(e) => Err(ClusterError::Discovery {
				kind: kind.to_string(),
				source: Box::new(e),
			}),
		}
	}

	async fn discover_bare(&self, kind: &str) -> Result<DiscoveredResource, ClusterError> {
		let discovery = Discovery::new(self.client.clone())
			.run()
			.await
			.map_err(|e| ClusterError::Discovery {
				kind: kind.to_string(),
				source: Box::new(e),
			})?;

		let resource = discovery
			.groups()
			.find_map(|group| group.recommended_kind(kind))
			.map(|(api_resource, capabilities)| DiscoveredResource::new(api_resource, &capabilities))
			.ok_or_else(|| ClusterError::UnknownResource {
				api_version: String::new(),
				kind: kind.to_string(),
			});
		resource
	}
}
