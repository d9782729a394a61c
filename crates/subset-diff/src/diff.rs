//! Subset diffing of desired manifests against live cluster state.
//!
//! Every manifest is fetched from the cluster in its own task. The live
//! object is reduced to the fields the manifest mentions (see
//! [`crate::subset`]), both sides are serialized to canonical YAML and the
//! pairs are rendered in input order.

use std::sync::Arc;

use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::instrument;

use crate::{
	config::SubsetDiffConfig,
	k8s::{
		accessor::KubeAccessor,
		client::{ClusterAccessor, ClusterConnection, ClusterError, ConnectionError},
	},
	manifest::{diff_name, Manifest, ManifestError, Object},
	render::{RenderError, Renderer},
	subset::subset,
	yaml::{is_empty_object, to_yaml, YamlError},
};

#[derive(Debug, Error)]
pub enum DiffError {
	#[error("getting state from cluster")]
	GetState(#[source] ClusterError),

	#[error("invalid manifest {name:?}")]
	InvalidManifest {
		name: String,
		#[source]
		source: ManifestError,
	},

	#[error("serializing to yaml")]
	Serialize(#[source] YamlError),

	#[error("calculating subset")]
	CalculateSubset(#[source] Box<DiffError>),

	#[error("invoking diff")]
	InvokeDiff(#[source] RenderError),

	#[error("diff task panicked")]
	TaskPanicked(#[source] tokio::task::JoinError),

	#[error("semaphore closed unexpectedly")]
	SemaphoreClosed,
}

/// Serialized sides of one manifest, ready for rendering.
///
/// `before` is the reduced live object, empty when the object does not exist
/// yet. `after` is the desired manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceRecord {
	pub name: String,
	pub before: String,
	pub after: String,
}

/// Produce the record for a single manifest.
///
/// An object missing from the cluster is diffed against nothing, so it shows
/// up as a pure addition. Any other cluster error is fatal.
#[instrument(skip_all, fields(name = %diff_name(manifest)))]
pub async fn diff_one<C>(accessor: &C, manifest: &Manifest) -> Result<DifferenceRecord, DiffError>
where
	C: ClusterAccessor + ?Sized,
{
	let name = diff_name(manifest);
	manifest
		.verify()
		.map_err(|source| DiffError::InvalidManifest {
			name: name.clone(),
			source,
		})?;
	let kind = manifest.qualified_kind().unwrap_or_default();
	let object_name = manifest.name().unwrap_or_default();

	let live = match accessor.get(manifest.namespace(), &kind, object_name).await {
		Ok(live) => live,
		Err(e) if e.is_not_found() => {
			tracing::debug!(%kind, name = %object_name, "object not found in cluster, treating as new");
			Object::new()
		}
		Err(e) => return Err(DiffError::GetState(e)),
	};

	let after = to_yaml(&manifest.as_object().clone().into()).map_err(DiffError::Serialize)?;

	let reduced = subset(manifest.as_object(), &live);
	let mut before = to_yaml(&reduced.into()).map_err(DiffError::Serialize)?;
	if is_empty_object(&before) {
		before.clear();
	}

	Ok(DifferenceRecord {
		name,
		before,
		after,
	})
}

/// Something that can tell how a set of manifests differs from a cluster.
pub trait Differ {
	/// `Ok(None)` means no differences.
	fn diff(
		&self,
		manifests: &[Manifest],
	) -> impl std::future::Future<Output = Result<Option<String>, DiffError>> + Send;
}

/// Diff orchestrator: fetches concurrently, renders in input order.
pub struct SubsetDiffer<C> {
	accessor: Arc<C>,
	renderer: Arc<dyn Renderer>,
	max_concurrent_fetches: Option<usize>,
}

impl<C: ClusterAccessor> SubsetDiffer<C> {
	pub fn new(accessor: C, renderer: impl Renderer + 'static) -> Self {
		Self {
			accessor: Arc::new(accessor),
			renderer: Arc::new(renderer),
			max_concurrent_fetches: SubsetDiffConfig::default().max_concurrent_fetches,
		}
	}

	pub fn from_config(accessor: C, config: &SubsetDiffConfig) -> Self {
		Self {
			accessor: Arc::new(accessor),
			renderer: Arc::from(config.renderer.build()),
			max_concurrent_fetches: config.max_concurrent_fetches,
		}
	}

	/// Bound the number of fetches in flight; `None` removes the bound.
	#[must_use]
	pub fn with_max_concurrent_fetches(mut self, limit: Option<usize>) -> Self {
		self.max_concurrent_fetches = limit;
		self
	}

	pub fn accessor(&self) -> &C {
		&self.accessor
	}

	/// Diff all manifests against the cluster.
	///
	/// A single failure fails the whole call and no output is produced. All
	/// fetches are still awaited before returning.
	#[instrument(skip_all, fields(manifest_count = manifests.len()))]
	pub async fn diff(&self, manifests: &[Manifest]) -> Result<Option<String>, DiffError> {
		if manifests.is_empty() {
			return Ok(None);
		}

		let records = self.collect_records(manifests).await?;

		// Renderers may spawn processes and touch the filesystem.
		let renderer = Arc::clone(&self.renderer);
		tokio::task::spawn_blocking(move || render_all(renderer.as_ref(), &records))
			.await
			.map_err(DiffError::TaskPanicked)?
	}

	async fn collect_records(
		&self,
		manifests: &[Manifest],
	) -> Result<Vec<DifferenceRecord>, DiffError> {
		// A zero-sized pool would never hand out a permit.
		let semaphore = self
			.max_concurrent_fetches
			.map(|limit| Arc::new(Semaphore::new(limit.max(1))));
		let mut join_set = JoinSet::new();

		for (index, manifest) in manifests.iter().cloned().map(Arc::new).enumerate() {
			let accessor = Arc::clone(&self.accessor);
			let semaphore = semaphore.clone();

			join_set.spawn(async move {
				let _permit = match semaphore {
					Some(sem) => match sem.acquire_owned().await {
						Ok(permit) => Some(permit),
						Err(_) => return (index, Err(DiffError::SemaphoreClosed)),
					},
					None => None,
				};
				(index, diff_one(accessor.as_ref(), &manifest).await)
			});
		}

		let mut slots: Vec<Option<DifferenceRecord>> = vec![None; manifests.len()];
		let mut last_error = None;

		while let Some(joined) = join_set.join_next().await {
			match joined {
				Ok((index, Ok(record))) => slots[index] = Some(record),
				Ok((index, Err(e))) => {
					tracing::debug!(index, error = %e, "diff task failed");
					last_error = Some(e);
				}
				Err(e) => last_error = Some(DiffError::TaskPanicked(e)),
			}
		}

		if let Some(e) = last_error {
			return Err(DiffError::CalculateSubset(Box::new(e)));
		}

		Ok(slots.into_iter().flatten().collect())
	}
}

/// Render records in order, joining non-empty diffs with a blank line.
fn render_all(
	renderer: &dyn Renderer,
	records: &[DifferenceRecord],
) -> Result<Option<String>, DiffError> {
	let mut output = String::new();
	for record in records {
		let rendered = renderer
			.render(&record.name, &record.before, &record.after)
			.map_err(DiffError::InvokeDiff)?;
		if !rendered.is_empty() {
			output.push_str(&rendered);
			output.push('\n');
		}
	}
	if output.ends_with('\n') {
		output.pop();
	}

	if output.is_empty() {
		Ok(None)
	} else {
		Ok(Some(output))
	}
}

impl SubsetDiffer<KubeAccessor> {
	/// Connect to the cluster named in `config` and build a differ for it.
	pub async fn connect(config: &SubsetDiffConfig) -> Result<Self, ConnectionError> {
		let connection = ClusterConnection::connect(&config.connection).await?;
		tracing::debug!(cluster = %connection.cluster_identifier(), "connected");
		Ok(Self::from_config(KubeAccessor::new(connection), config))
	}
}

impl<C: ClusterAccessor> Differ for SubsetDiffer<C> {
	async fn diff(&self, manifests: &[Manifest]) -> Result<Option<String>, DiffError> {
		Self::diff(self, manifests).await
	}
}
