//! Desired-state resource manifests.
//!
//! A [`Manifest`] is a single Kubernetes object as rendered by the user's
//! configuration. The diff engine only ever reads it.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// A keyed tree of values, the shape of every Kubernetes object.
pub type Object = Map<String, Value>;

/// Ordered list of manifests, as produced by the configuration layer.
pub type ManifestList = Vec<Manifest>;

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error("manifest is not an object, found {0}")]
	NotAnObject(&'static str),

	#[error("manifest is missing required fields: {}", .0.join(", "))]
	MissingFields(Vec<&'static str>),

	#[error("parsing manifest stream: {0}")]
	ParseYaml(String),
}

/// One desired-state resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest(Object);

impl Manifest {
	pub fn new(object: Object) -> Self {
		Self(object)
	}

	pub fn api_version(&self) -> Option<&str> {
		self.0.get("apiVersion").and_then(Value::as_str)
	}

	pub fn kind(&self) -> Option<&str> {
		self.0.get("kind").and_then(Value::as_str)
	}

	pub fn name(&self) -> Option<&str> {
		self.metadata_str("name")
	}

	pub fn namespace(&self) -> Option<&str> {
		self.metadata_str("namespace")
	}

	fn metadata_str(&self, key: &str) -> Option<&str> {
		self.0
			.get("metadata")
			.and_then(|m| m.get(key))
			.and_then(Value::as_str)
	}

	/// Kind qualified with version and group, kubectl style.
	///
	/// `apps/v1` + `Deployment` becomes `Deployment.v1.apps`, `v1` + `ConfigMap`
	/// becomes `ConfigMap.v1`. Without an apiVersion the bare kind is returned.
	pub fn qualified_kind(&self) -> Option<String> {
		let kind = self.kind()?;
		Some(match self.api_version() {
			Some(api_version) => match api_version.split_once('/') {
				Some((group, version)) => format!("{kind}.{version}.{group}"),
				None => format!("{kind}.{api_version}"),
			},
			None => kind.to_string(),
		})
	}

	/// Check that the fields needed to locate the object in a cluster are set.
	///
	/// All missing fields are reported at once.
	pub fn verify(&self) -> Result<(), ManifestError> {
		let mut missing = Vec::new();
		if self.api_version().is_none() {
			missing.push("apiVersion");
		}
		if self.kind().is_none() {
			missing.push("kind");
		}
		if self.name().is_none() {
			missing.push("metadata.name");
		}
		if missing.is_empty() {
			Ok(())
		} else {
			Err(ManifestError::MissingFields(missing))
		}
	}

	pub fn as_object(&self) -> &Object {
		&self.0
	}

	pub fn into_object(self) -> Object {
		self.0
	}

	/// Parse a multi-document YAML stream, skipping empty documents.
	pub fn list_from_yaml_stream(input: &str) -> Result<ManifestList, ManifestError> {
		let documents: Vec<Value> = serde_saphyr::from_multiple_with_options(
			input,
			serde_saphyr::Options {
				budget: None,
				..Default::default()
			},
		)
		.map_err(|e| ManifestError::ParseYaml(e.to_string()))?;

		documents
			.into_iter()
			.filter(|doc| !doc.is_null())
			.map(Self::try_from)
			.collect()
	}
}

impl TryFrom<Value> for Manifest {
	type Error = ManifestError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Object(object) => Ok(Self(object)),
			Value::Null => Err(ManifestError::NotAnObject("null")),
			Value::Bool(_) => Err(ManifestError::NotAnObject("bool")),
			Value::Number(_) => Err(ManifestError::NotAnObject("number")),
			Value::String(_) => Err(ManifestError::NotAnObject("string")),
			Value::Array(_) => Err(ManifestError::NotAnObject("array")),
		}
	}
}

impl From<Manifest> for Value {
	fn from(manifest: Manifest) -> Self {
		Value::Object(manifest.0)
	}
}

impl fmt::Display for Manifest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}/{}",
			self.kind().unwrap_or_default(),
			self.name().unwrap_or_default()
		)
	}
}

/// Display label used as the file name in diff headers.
///
/// Format: `apiVersion.kind.namespace.name` with `/` replaced by `-`.
/// Missing parts are left empty, so a cluster-scoped object yields `..` around
/// its (empty) namespace.
pub fn diff_name(manifest: &Manifest) -> String {
	format!(
		"{}.{}.{}.{}",
		manifest.api_version().unwrap_or_default(),
		manifest.kind().unwrap_or_default(),
		manifest.namespace().unwrap_or_default(),
		manifest.name().unwrap_or_default(),
	)
	.replace('/', "-")
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use indoc::indoc;
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn manifest(value: Value) -> Manifest {
		Manifest::try_from(value).expect("test manifest is an object")
	}

	#[rstest]
	#[case(
		json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "grafana", "namespace": "monitoring"}}),
		"apps-v1.Deployment.monitoring.grafana"
	)]
	#[case(
		json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "default"}}),
		"v1.ConfigMap.default.cfg"
	)]
	#[case(
		json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "production"}}),
		"v1.Namespace..production"
	)]
	#[case(
		json!({"apiVersion": "rbac.authorization.k8s.io/v1", "kind": "ClusterRole", "metadata": {"name": "system:reader"}}),
		"rbac.authorization.k8s.io-v1.ClusterRole..system:reader"
	)]
	fn test_diff_name(#[case] value: Value, #[case] expected: &str) {
		assert_eq!(diff_name(&manifest(value)), expected);
	}

	#[rstest]
	#[case(json!({"apiVersion": "apps/v1", "kind": "Deployment"}), Some("Deployment.v1.apps"))]
	#[case(json!({"apiVersion": "v1", "kind": "Service"}), Some("Service.v1"))]
	#[case(json!({"kind": "Service"}), Some("Service"))]
	#[case(json!({"apiVersion": "v1"}), None)]
	fn test_qualified_kind(#[case] value: Value, #[case] expected: Option<&str>) {
		assert_eq!(manifest(value).qualified_kind().as_deref(), expected);
	}

	#[test]
	fn test_verify_reports_all_missing_fields() {
		let m = manifest(json!({"metadata": {}}));
		assert_matches!(
			m.verify(),
			Err(ManifestError::MissingFields(fields)) if fields == vec!["apiVersion", "kind", "metadata.name"]
		);

		let m = manifest(json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "s"}}));
		assert!(m.verify().is_ok());
	}

	#[test]
	fn test_try_from_rejects_non_objects() {
		assert_matches!(
			Manifest::try_from(json!([1, 2])),
			Err(ManifestError::NotAnObject("array"))
		);
		assert_matches!(
			Manifest::try_from(Value::Null),
			Err(ManifestError::NotAnObject("null"))
		);
	}

	#[test]
	fn test_list_from_yaml_stream() {
		let list = Manifest::list_from_yaml_stream(indoc! {"
			apiVersion: v1
			kind: ConfigMap
			metadata:
			  name: first
			---
			apiVersion: apps/v1
			kind: Deployment
			metadata:
			  name: second
			  namespace: apps
		"})
		.expect("valid stream");

		assert_eq!(list.len(), 2);
		assert_eq!(list[0].name(), Some("first"));
		assert_eq!(list[0].namespace(), None);
		assert_eq!(list[1].namespace(), Some("apps"));
		assert_eq!(list[1].to_string(), "Deployment/second");
	}
}
