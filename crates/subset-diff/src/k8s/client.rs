//! Cluster access contract and kubeconfig-based connections.

use std::{future::Future, time::Duration};

use kube::{
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

use crate::{config::ConnectionTarget, manifest::Object};

/// Read timeout applied to every API request.
const API_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by a [`ClusterAccessor`].
///
/// [`ClusterError::NotFound`] is the only kind callers are expected to
/// recover from.
#[derive(Debug, Error)]
pub enum ClusterError {
	#[error("{kind} {name:?} not found")]
	NotFound { kind: String, name: String },

	#[error("the server doesn't have a resource type {kind:?} in {api_version:?}")]
	UnknownResource { api_version: String, kind: String },

	#[error("invalid resource kind {0:?}")]
	InvalidKind(String),

	#[error("fetching {kind}/{name}")]
	Request {
		kind: String,
		name: String,
		#[source]
		source: Box<kube::Error>,
	},

	#[error("discovering resource {kind}")]
	Discovery {
		kind: String,
		#[source]
		source: Box<kube::Error>,
	},

	#[error("decoding {kind}/{name}")]
	Decode {
		kind: String,
		name: String,
		#[source]
		source: serde_json::Error,
	},
}

impl ClusterError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}
}

/// Read access to live objects.
///
/// `kind` is either a bare kind (`Deployment`) or a kubectl-style qualified
/// kind (`Deployment.v1.apps`, `ConfigMap.v1`). `namespace` is ignored for
/// cluster-scoped kinds.
pub trait ClusterAccessor: Send + Sync + 'static {
	fn get(
		&self,
		namespace: Option<&str>,
		kind: &str,
		name: &str,
	) -> impl Future<Output = Result<Object, ClusterError>> + Send;
}

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no cluster selected: set exactly one of `apiServer` or `contextNames`")]
	IncompleteTarget,

	#[error("both `apiServer` and `contextNames` are set, use only one")]
	AmbiguousTarget,

	#[error("contextNames is empty")]
	EmptyContextNames,

	#[error("no cluster that matches the apiServer `{0}` was found. Please check your $KUBECONFIG")]
	ClusterNotFound(String),

	#[error("no context using cluster `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFoundForCluster(String),

	#[error("no context named `{0:?}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(Vec<String>),

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// A kube client bound to one cluster context.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	/// Context name, plus the API server URL when selected by URL.
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using the kubeconfig from the environment (`$KUBECONFIG` or
	/// `~/.kube/config`).
	#[instrument(skip_all)]
	pub async fn connect(target: &ConnectionTarget) -> Result<Self, ConnectionError> {
		let kubeconfig = Kubeconfig::read()?;
		Self::connect_with_kubeconfig(target, kubeconfig).await
	}

	/// Connect using an explicit kubeconfig.
	///
	/// Exactly one of `target.api_server` or `target.context_names` must be set:
	/// - `api_server` picks the context whose cluster has that server URL,
	/// - `context_names` picks the first listed context that exists.
	#[instrument(skip_all)]
	pub async fn connect_with_kubeconfig(
		target: &ConnectionTarget,
		kubeconfig: Kubeconfig,
	) -> Result<Self, ConnectionError> {
		let (context, cluster_identifier) = match (&target.api_server, &target.context_names) {
			(Some(_), Some(_)) => return Err(ConnectionError::AmbiguousTarget),
			(None, None) => return Err(ConnectionError::IncompleteTarget),
			(Some(api_server), None) => {
				let context = context_for_api_server(&kubeconfig, api_server)?;
				tracing::debug!(%context, %api_server, "found context for apiServer");
				let identifier = format!("{api_server} (context:{context})");
				(context, identifier)
			}
			(None, Some(context_names)) => {
				let context = first_matching_context(&kubeconfig, context_names)?;
				tracing::debug!(%context, "using context from contextNames");
				let identifier = format!("context:{context}");
				(context, identifier)
			}
		};

		let mut config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: Some(context),
				..Default::default()
			},
		)
		.await?;
		config.read_timeout = Some(API_READ_TIMEOUT);
		if let Some(namespace) = &target.namespace {
			config.default_namespace.clone_from(namespace);
		}

		Ok(Self {
			client: Client::try_from(config)?,
			cluster_identifier,
		})
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Namespace used for namespaced objects that don't name one.
	pub fn default_namespace(&self) -> &str {
		self.client.default_namespace()
	}

	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}
}

fn context_for_api_server(
	kubeconfig: &Kubeconfig,
	api_server: &str,
) -> Result<String, ConnectionError> {
	let cluster_name = kubeconfig
		.clusters
		.iter()
		.find(|c| {
			c.cluster
				.as_ref()
				.is_some_and(|cluster| cluster.server.as_deref() == Some(api_server))
		})
		.map(|c| &c.name)
		.ok_or_else(|| ConnectionError::ClusterNotFound(api_server.to_string()))?;

	kubeconfig
		.contexts
		.iter()
		.find(|c| c.context.as_ref().is_some_and(|ctx| &ctx.cluster == cluster_name))
		.map(|c| c.name.clone())
		.ok_or_else(|| ConnectionError::ContextNotFoundForCluster(cluster_name.clone()))
}

fn first_matching_context(
	kubeconfig: &Kubeconfig,
	context_names: &[String],
) -> Result<String, ConnectionError> {
	if context_names.is_empty() {
		return Err(ConnectionError::EmptyContextNames);
	}

	context_names
		.iter()
		.find(|name| kubeconfig.contexts.iter().any(|c| &c.name == *name))
		.cloned()
		.ok_or_else(|| ConnectionError::ContextNotFound(context_names.to_vec()))
}
