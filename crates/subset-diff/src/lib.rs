//! Show how Kubernetes manifests differ from what is running in a cluster.
//!
//! Live objects carry a lot of server-managed state. Instead of diffing whole
//! objects, every live object is first reduced to the fields its manifest
//! mentions, so only changes to fields under local control are reported.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use subset_diff::{Manifest, SubsetDiffConfig, SubsetDiffer};
//!
//! let config = SubsetDiffConfig::load_from_directory(".".as_ref())?.unwrap_or_default();
//! let manifests = Manifest::list_from_yaml_stream(&std::fs::read_to_string("out.yaml")?)?;
//!
//! let differ = SubsetDiffer::connect(&config).await?;
//! if let Some(diff) = differ.diff(&manifests).await? {
//! 	println!("{diff}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diff;
pub mod k8s;
pub mod manifest;
pub mod render;
pub mod subset;
pub mod telemetry;
pub mod yaml;

pub use config::SubsetDiffConfig;
pub use diff::{DiffError, Differ, DifferenceRecord, SubsetDiffer};
pub use k8s::{
	accessor::KubeAccessor,
	client::{ClusterAccessor, ClusterConnection, ClusterError},
};
pub use manifest::{Manifest, ManifestList, Object};
pub use render::{ExternalRenderer, Renderer, UnifiedRenderer};
