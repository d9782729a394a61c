//! Configuration file support.
//!
//! A `.subset-diff.yaml` file can be placed anywhere in the directory
//! hierarchy; the search walks from a start directory up to the filesystem
//! root. Every field has a default, so an empty file is a valid config.

use std::{
	fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::render::{ExternalRenderer, Renderer, UnifiedRenderer};

/// The name of the config file searched for.
pub const CONFIG_FILE_NAME: &str = ".subset-diff.yaml";

/// Live fetches in flight at once unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {}", .path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file: {}: {message}", .path.display())]
	Parse { path: PathBuf, message: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetDiffConfig {
	/// Upper bound on concurrent live fetches; `null` removes the bound.
	#[serde(default = "default_max_concurrent_fetches")]
	pub max_concurrent_fetches: Option<usize>,

	#[serde(default)]
	pub renderer: RendererConfig,

	#[serde(default)]
	pub connection: ConnectionTarget,
}

fn default_max_concurrent_fetches() -> Option<usize> {
	Some(DEFAULT_MAX_CONCURRENT_FETCHES)
}

impl Default for SubsetDiffConfig {
	fn default() -> Self {
		Self {
			max_concurrent_fetches: default_max_concurrent_fetches(),
			renderer: RendererConfig::default(),
			connection: ConnectionTarget::default(),
		}
	}
}

/// Which renderer turns records into diff text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RendererConfig {
	Builtin(UnifiedRenderer),
	External(ExternalRenderer),
}

impl Default for RendererConfig {
	fn default() -> Self {
		Self::Builtin(UnifiedRenderer::default())
	}
}

impl RendererConfig {
	pub fn build(&self) -> Box<dyn Renderer> {
		match self {
			Self::Builtin(renderer) => Box::new(*renderer),
			Self::External(renderer) => Box::new(renderer.clone()),
		}
	}
}

/// Which cluster to read live state from.
///
/// Exactly one of `api_server` and `context_names` has to be set when
/// connecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTarget {
	/// Pick the kubeconfig context whose cluster has this server URL.
	#[serde(default)]
	pub api_server: Option<String>,

	/// Pick the first of these kubeconfig contexts that exists.
	#[serde(default)]
	pub context_names: Option<Vec<String>>,

	/// Namespace for namespaced objects that don't set one. Defaults to the
	/// context's namespace.
	#[serde(default)]
	pub namespace: Option<String>,
}

impl SubsetDiffConfig {
	/// Load config by searching from the given directory upward.
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>, ConfigError> {
		find_config_file(start_dir)
			.map(|path| Self::load(&path))
			.transpose()
	}

	/// Load config from a specific file path.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(&content).map_err(|message| ConfigError::Parse {
			path: path.to_path_buf(),
			message,
		})
	}

	fn parse(content: &str) -> Result<Self, String> {
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		serde_saphyr::from_str(content).map_err(|e| e.to_string())
	}
}

/// Search for a config file starting from `start_dir` and walking up to the
/// filesystem root.
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_defaults() {
		let config = SubsetDiffConfig::default();
		assert_eq!(config.max_concurrent_fetches, Some(8));
		assert_eq!(
			config.renderer,
			RendererConfig::Builtin(UnifiedRenderer { context_radius: 3 })
		);
		assert_eq!(config.connection, ConnectionTarget::default());
	}

	#[test]
	fn test_empty_file_is_default() {
		assert_eq!(
			SubsetDiffConfig::parse("").expect("empty config"),
			SubsetDiffConfig::default()
		);
	}

	#[test]
	fn test_parse_full() {
		let config = SubsetDiffConfig::parse(indoc! {"
			maxConcurrentFetches: 2
			renderer:
			  external:
			    program: colordiff
			    args: [-u]
			connection:
			  contextNames: [staging, dev]
			  namespace: apps
		"})
		.expect("valid config");

		assert_eq!(config.max_concurrent_fetches, Some(2));
		assert_eq!(
			config.renderer,
			RendererConfig::External(ExternalRenderer {
				program: "colordiff".to_string(),
				args: vec!["-u".to_string()],
			})
		);
		assert_eq!(
			config.connection.context_names,
			Some(vec!["staging".to_string(), "dev".to_string()])
		);
		assert_eq!(config.connection.namespace.as_deref(), Some("apps"));
		assert_eq!(config.connection.api_server, None);
	}

	#[test]
	fn test_null_concurrency_is_unbounded() {
		let config = SubsetDiffConfig::parse("maxConcurrentFetches: null\n").expect("valid config");
		assert_eq!(config.max_concurrent_fetches, None);
	}

	#[test]
	fn test_builtin_renderer_defaults_radius() {
		let config = SubsetDiffConfig::parse("renderer:\n  builtin: {}\n").expect("valid config");
		assert_eq!(config.renderer, RendererConfig::default());
	}

	#[test]
	fn test_find_config_in_parent_dir() {
		let temp = TempDir::new().expect("tempdir");
		fs::write(temp.path().join(CONFIG_FILE_NAME), "maxConcurrentFetches: 4\n")
			.expect("write config");
		let subdir = temp.path().join("a").join("b");
		fs::create_dir_all(&subdir).expect("create subdir");

		let found = find_config_file(&subdir).expect("config found");
		assert_eq!(found.file_name(), Some(CONFIG_FILE_NAME.as_ref()));

		let config = SubsetDiffConfig::load_from_directory(&subdir)
			.expect("valid config")
			.expect("config present");
		assert_eq!(config.max_concurrent_fetches, Some(4));
	}

	#[test]
	fn test_missing_config_is_none() {
		let temp = TempDir::new().expect("tempdir");
		// A config further up the real filesystem would be picked up too, so
		// only the direct lookup is checked here.
		assert!(!temp.path().join(CONFIG_FILE_NAME).exists());
		assert_matches!(
			SubsetDiffConfig::load(&temp.path().join(CONFIG_FILE_NAME)),
			Err(ConfigError::Read { .. })
		);
	}

	#[test]
	fn test_invalid_yaml_reports_path() {
		let temp = TempDir::new().expect("tempdir");
		let path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&path, "maxConcurrentFetches: [nope\n").expect("write config");
		assert_matches!(
			SubsetDiffConfig::load(&path),
			Err(ConfigError::Parse { path: p, .. }) if p == path
		);
	}
}
