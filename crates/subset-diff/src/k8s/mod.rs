//! Live state from a Kubernetes cluster.
//!
//! [`client::ClusterAccessor`] is the seam the diff engine fetches through;
//! [`accessor::KubeAccessor`] implements it on top of kube-rs.

pub mod accessor;
pub mod client;
pub mod discovery;

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource lives in a namespace (e.g., Deployment, ConfigMap).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace, ClusterRole).
	ClusterWide,
}
