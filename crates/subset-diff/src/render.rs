//! Turning two serialized documents into diff text.

use std::{
	fs,
	path::{Path, PathBuf},
	process::Command,
};

use serde::Deserialize;
use similar::TextDiff;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum RenderError {
	#[error("creating temporary directory")]
	CreateTempDir(#[source] std::io::Error),

	#[error("writing {}", .path.display())]
	WriteFile {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("running `{program}`")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{program}` exited with {status}: {stderr}")]
	Failed {
		program: String,
		status: std::process::ExitStatus,
		stderr: String,
	},

	#[error("`{program}` produced non UTF-8 output")]
	InvalidUtf8 {
		program: String,
		#[source]
		source: std::string::FromUtf8Error,
	},
}

/// Renders the difference between two documents.
///
/// `before` is what is there now, `after` what it will become. Equal inputs
/// must produce an empty string.
pub trait Renderer: Send + Sync {
	fn render(&self, name: &str, before: &str, after: &str) -> Result<String, RenderError>;
}

fn live_label(name: &str) -> String {
	format!("LIVE/{name}")
}

fn merged_label(name: &str) -> String {
	format!("MERGED/{name}")
}

/// In-process unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnifiedRenderer {
	/// Lines of context around each change.
	pub context_radius: usize,
}

impl Default for UnifiedRenderer {
	fn default() -> Self {
		Self { context_radius: 3 }
	}
}

impl Renderer for UnifiedRenderer {
	fn render(&self, name: &str, before: &str, after: &str) -> Result<String, RenderError> {
		if before == after {
			return Ok(String::new());
		}

		Ok(TextDiff::from_lines(before, after)
			.unified_diff()
			.context_radius(self.context_radius)
			.header(&live_label(name), &merged_label(name))
			.to_string())
	}
}

/// Delegates to an external diff program, `diff -u -N` by default.
///
/// The program is called with the live file and the merged file as its last
/// two arguments. Exit status 0 means no differences, 1 means differences were
/// printed to stdout, anything else is an error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalRenderer {
	pub program: String,
	pub args: Vec<String>,
}

impl Default for ExternalRenderer {
	fn default() -> Self {
		Self {
			program: "diff".to_string(),
			args: vec!["-u".to_string(), "-N".to_string()],
		}
	}
}

impl ExternalRenderer {
	fn write(path: &Path, contents: &str) -> Result<(), RenderError> {
		fs::write(path, contents).map_err(|source| RenderError::WriteFile {
			path: path.to_path_buf(),
			source,
		})
	}
}

impl Renderer for ExternalRenderer {
	#[instrument(skip(self, before, after), fields(program = %self.program))]
	fn render(&self, name: &str, before: &str, after: &str) -> Result<String, RenderError> {
		let dir = tempfile::tempdir().map_err(RenderError::CreateTempDir)?;
		let live = dir.path().join(format!("LIVE-{name}"));
		let merged = dir.path().join(format!("MERGED-{name}"));
		Self::write(&live, before)?;
		Self::write(&merged, after)?;

		let output = Command::new(&self.program)
			.args(&self.args)
			.arg(&live)
			.arg(&merged)
			.output()
			.map_err(|source| RenderError::Spawn {
				program: self.program.clone(),
				source,
			})?;

		match output.status.code() {
			Some(0) => Ok(String::new()),
			Some(1) => {
				let stdout =
					String::from_utf8(output.stdout).map_err(|source| RenderError::InvalidUtf8 {
						program: self.program.clone(),
						source,
					})?;
				Ok(stdout
					.replace(&*live.to_string_lossy(), &live_label(name))
					.replace(&*merged.to_string_lossy(), &merged_label(name)))
			}
			_ => Err(RenderError::Failed {
				program: self.program.clone(),
				status: output.status,
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			}),
		}
	}
}
