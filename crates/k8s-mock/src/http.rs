//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This is a real HTTP server, so it works with kubeconfig-based connections
//! exactly like a cluster would. It serves legacy discovery and single-object
//! GETs, everything else answers 404.

use std::{collections::HashMap, sync::Arc};

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use serde_json::{json, Value};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::discovery::MockDiscovery;

type ObjectKey = (String, String);

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Objects to serve. API paths are derived from apiVersion/kind using the
	/// discovery data; objects of unknown types are ignored.
	#[builder(default)]
	resources: Vec<Value>,
	/// Objects whose GET answers with a 500 Internal Server Error.
	#[builder(default)]
	failing_resources: Vec<Value>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		let discovery = MockDiscovery::default();

		debug!(uri = %server.uri(), "started mock K8s server");

		let mut resources: HashMap<ObjectKey, Value> = HashMap::new();
		for manifest in self.resources {
			if let Some(key) = api_path_for_manifest(&manifest, &discovery) {
				trace!(api_path = %key.0, name = %key.1, "registered resource");
				resources.insert(key, manifest);
			}
		}

		resources
			.entry(("/api/v1/namespaces".to_string(), "default".to_string()))
			.or_insert_with(|| {
				json!({
					"apiVersion": "v1",
					"kind": "Namespace",
					"metadata": {"name": "default"}
				})
			});

		mount_version(&server).await;
		mount_discovery(&server, &discovery).await;
		for manifest in &self.failing_resources {
			if let Some((api_path, name)) = api_path_for_manifest(manifest, &discovery) {
				mount_failure(&server, &format!("{api_path}/{name}")).await;
			}
		}
		mount_resources(&server, Arc::new(resources)).await;

		RunningHttpMockK8sServer { server }
	}
}

/// Derive the collection path and object name for a manifest.
fn api_path_for_manifest(manifest: &Value, discovery: &MockDiscovery) -> Option<ObjectKey> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let name = manifest.pointer("/metadata/name")?.as_str()?.to_string();
	let namespace = manifest
		.pointer("/metadata/namespace")
		.and_then(Value::as_str)
		.unwrap_or("default");

	let resource = discovery.find(api_version, kind)?;
	let root = if api_version.contains('/') { "apis" } else { "api" };

	let path = if resource.namespaced {
		format!("/{root}/{api_version}/namespaces/{namespace}/{}", resource.name)
	} else {
		format!("/{root}/{api_version}/{}", resource.name)
	};

	Some((path, name))
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Number of object GETs received so far, discovery requests excluded.
	pub async fn object_requests(&self) -> usize {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.iter()
			.filter(|req| req.method.as_str() == "GET")
			.filter(|req| is_object_path(req.url.path()))
			.count()
	}
}

/// Whether a path addresses a single object rather than a discovery document.
fn is_object_path(path: &str) -> bool {
	let segments = path.trim_matches('/').split('/').count();
	// api/v1/<plural>/<name> and apis/<group>/<version>/<plural>/<name> at least
	match path.split('/').nth(1) {
		Some("api") => segments >= 4,
		Some("apis") => segments >= 5,
		_ => false,
	}
}

fn status(code: u16, reason: &str, message: &str) -> ResponseTemplate {
	ResponseTemplate::new(code).set_body_json(json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	}))
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-01-01T00:00:00Z",
			"goVersion": "go1.22.0",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery) {
	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIVersions",
			"versions": ["v1"],
			"serverAddressByClientCIDRs": []
		})))
		.mount(server)
		.await;

	let groups: Vec<_> = discovery
		.group_resources
		.keys()
		.map(|gv| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			json!({
				"name": group,
				"versions": [{"groupVersion": gv, "version": version}],
				"preferredVersion": {"groupVersion": gv, "version": version}
			})
		})
		.collect();

	Mock::given(method("GET"))
		.and(path("/apis"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIGroupList",
			"apiVersion": "v1",
			"groups": groups
		})))
		.mount(server)
		.await;

	let lists = std::iter::once(("v1", "/api/v1".to_string(), &discovery.core_resources)).chain(
		discovery
			.group_resources
			.iter()
			.map(|(gv, rs)| (gv.as_str(), format!("/apis/{gv}"), rs)),
	);

	for (group_version, url, resources) in lists {
		let resources: Vec<_> = resources.iter().map(|r| r.to_api_resource_json()).collect();
		Mock::given(method("GET"))
			.and(path(url))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"kind": "APIResourceList",
				"apiVersion": "v1",
				"groupVersion": group_version,
				"resources": resources
			})))
			.mount(server)
			.await;
	}
}

async fn mount_failure(server: &MockServer, object_path: &str) {
	trace!(path = %object_path, "registered failing resource");
	Mock::given(method("GET"))
		.and(path(object_path))
		.respond_with(status(500, "InternalError", "injected failure"))
		.mount(server)
		.await;
}

async fn mount_resources(server: &MockServer, resources: Arc<HashMap<ObjectKey, Value>>) {
	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let key = parse_resource_path(req.url.path());
			match resources.get(&key) {
				Some(resource) => ResponseTemplate::new(200).set_body_json(resource),
				None => status(
					404,
					"NotFound",
					&format!("{} \"{}\" not found", key.0, key.1),
				),
			}
		})
		.mount(server)
		.await;
}

/// Split a request path into (collection path, object name).
fn parse_resource_path(path: &str) -> ObjectKey {
	let path = path.trim_end_matches('/');
	match path.rsplit_once('/') {
		Some((api_path, name)) => (api_path.to_string(), name.to_string()),
		None => (path.to_string(), String::new()),
	}
}
