//! Narrowing live objects down to the fields of a desired object.
//!
//! The API server returns a lot more than was ever submitted: status,
//! defaulted fields, metadata like `uid` and `resourceVersion`. None of that
//! is known locally, so a plain diff of the whole object would be mostly
//! noise. [`subset`] keeps only what the desired object mentions.

use serde_json::Value;

use crate::manifest::Object;

/// Reduce `live` to the keys that also exist in `desired`.
///
/// The result is a new object; neither input is modified.
///
/// Two fields are copied from `desired` regardless of what `live` holds:
/// - `namespace`, so a server-assigned namespace is never reported,
/// - `apiVersion` (only when both sides set it), so version skew between the
///   requested and the served version is not reported.
///
/// A key whose desired value is `null` counts as absent. An empty `live`
/// object always reduces to an empty object, nothing is injected into it.
pub fn subset(desired: &Object, live: &Object) -> Object {
	let mut reduced = Object::new();
	if live.is_empty() {
		return reduced;
	}

	for (key, live_value) in live {
		let Some(desired_value) = desired.get(key).filter(|v| !v.is_null()) else {
			continue;
		};
		reduced.insert(key.clone(), subset_value(desired_value, live_value));
	}

	if let Some(namespace) = desired.get("namespace").filter(|v| !v.is_null()) {
		reduced.insert("namespace".to_string(), namespace.clone());
	}

	if let Some(api_version) = desired.get("apiVersion").filter(|v| !v.is_null()) {
		if live.get("apiVersion").is_some_and(|v| !v.is_null()) {
			reduced.insert("apiVersion".to_string(), api_version.clone());
		}
	}

	reduced
}

fn subset_value(desired: &Value, live: &Value) -> Value {
	match (desired, live) {
		(Value::Object(desired), Value::Object(live)) => Value::Object(subset(desired, live)),
		(Value::Array(desired), Value::Array(live)) => Value::Array(subset_list(desired, live)),
		(_, live) => live.clone(),
	}
}

/// Reduce list elements pairwise by position.
///
/// Only pairs of objects are reduced. Elements beyond the end of the desired
/// list are kept as they are; they still show up in the diff.
fn subset_list(desired: &[Value], live: &[Value]) -> Vec<Value> {
	live.iter()
		.enumerate()
		.map(|(i, live_elem)| match (desired.get(i), live_elem) {
			(Some(Value::Object(d)), Value::Object(l)) => Value::Object(subset(d, l)),
			_ => live_elem.clone(),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn object(value: Value) -> Object {
		match value {
			Value::Object(o) => o,
			other => panic!("expected object, got {other}"),
		}
	}

	fn reduce(desired: Value, live: Value) -> Value {
		Value::Object(subset(&object(desired), &object(live)))
	}

	#[test]
	fn test_nested_keys_not_in_desired_are_dropped() {
		let reduced = reduce(
			json!({"a": 1, "b": {"c": 2, "d": 3}}),
			json!({"a": 1, "b": {"c": 9, "e": 5}, "f": 7}),
		);
		assert_eq!(reduced, json!({"a": 1, "b": {"c": 9}}));
	}

	#[test]
	fn test_empty_live_stays_empty() {
		let reduced = reduce(
			json!({"apiVersion": "v1", "kind": "ConfigMap", "data": {"k": "v"}}),
			json!({}),
		);
		assert_eq!(reduced, json!({}));
	}

	#[test]
	fn test_namespace_copied_from_desired() {
		let reduced = reduce(
			json!({"namespace": "mine", "x": 1}),
			json!({"namespace": "theirs", "x": 2}),
		);
		assert_eq!(reduced, json!({"namespace": "mine", "x": 2}));

		// Injected even when the live side does not have one.
		let reduced = reduce(json!({"namespace": "mine"}), json!({"x": 2}));
		assert_eq!(reduced, json!({"namespace": "mine"}));

		// But never into an object that does not exist yet.
		let reduced = reduce(json!({"namespace": "mine", "apiVersion": "v1"}), json!({}));
		assert_eq!(reduced, json!({}));
	}

	#[test]
	fn test_live_namespace_untouched_without_desired_namespace() {
		let reduced = reduce(json!({"x": 1}), json!({"namespace": "theirs", "x": 2}));
		assert_eq!(reduced, json!({"x": 2}));

		let reduced = reduce(
			json!({"namespace": "theirs", "x": 1}),
			json!({"namespace": "theirs", "x": 2}),
		);
		assert_eq!(reduced, json!({"namespace": "theirs", "x": 2}));
	}

	#[test]
	fn test_metadata_namespace_is_reduced_normally() {
		let reduced = reduce(
			json!({"metadata": {"name": "a", "namespace": "default"}}),
			json!({"metadata": {"name": "a", "namespace": "default", "uid": "123", "resourceVersion": "9"}}),
		);
		assert_eq!(
			reduced,
			json!({"metadata": {"name": "a", "namespace": "default"}})
		);
	}

	#[test]
	fn test_api_version_copied_only_when_both_set() {
		let reduced = reduce(
			json!({"apiVersion": "apps/v1", "kind": "Deployment"}),
			json!({"apiVersion": "extensions/v1beta1", "kind": "Deployment"}),
		);
		assert_eq!(reduced, json!({"apiVersion": "apps/v1", "kind": "Deployment"}));

		let reduced = reduce(
			json!({"apiVersion": "apps/v1", "kind": "Deployment"}),
			json!({"kind": "Deployment"}),
		);
		assert_eq!(reduced, json!({"kind": "Deployment"}));
	}

	#[test]
	fn test_null_desired_value_counts_as_absent() {
		let reduced = reduce(json!({"a": null, "b": 1}), json!({"a": 5, "b": 2}));
		assert_eq!(reduced, json!({"b": 2}));
	}

	#[test]
	fn test_list_of_objects_reduced_by_position() {
		let reduced = reduce(
			json!({"containers": [
				{"name": "app", "image": "app:1"},
				{"name": "sidecar", "image": "proxy:1"}
			]}),
			json!({"containers": [
				{"name": "app", "image": "app:2", "terminationMessagePath": "/dev/termination-log"},
				{"name": "sidecar", "image": "proxy:1", "resources": {}}
			]}),
		);
		assert_eq!(
			reduced,
			json!({"containers": [
				{"name": "app", "image": "app:2"},
				{"name": "sidecar", "image": "proxy:1"}
			]})
		);
	}

	#[test]
	fn test_live_list_longer_than_desired_keeps_tail() {
		let reduced = reduce(
			json!({"items": [{"a": 1}]}),
			json!({"items": [{"a": 1, "x": 0}, {"a": 2, "x": 0}]}),
		);
		assert_eq!(reduced, json!({"items": [{"a": 1}, {"a": 2, "x": 0}]}));
	}

	#[test]
	fn test_mixed_list_leaves_scalars_alone() {
		let reduced = reduce(
			json!({"args": ["--flag", {"k": 1}, 3]}),
			json!({"args": ["--other", {"k": 2, "extra": true}, {"not": "scalar"}]}),
		);
		assert_eq!(
			reduced,
			json!({"args": ["--other", {"k": 2}, {"not": "scalar"}]})
		);
	}

	#[rstest]
	#[case::map_vs_scalar(json!({"a": {"b": 1}}), json!({"a": "text"}), json!({"a": "text"}))]
	#[case::scalar_vs_map(json!({"a": "text"}), json!({"a": {"b": 1}}), json!({"a": {"b": 1}}))]
	#[case::list_vs_map(json!({"a": [1]}), json!({"a": {"b": 1}}), json!({"a": {"b": 1}}))]
	#[case::map_vs_list(json!({"a": {"b": 1}}), json!({"a": [{"b": 1, "c": 2}]}), json!({"a": [{"b": 1, "c": 2}]}))]
	fn test_mismatched_shapes_kept_as_is(
		#[case] desired: Value,
		#[case] live: Value,
		#[case] expected: Value,
	) {
		assert_eq!(reduce(desired, live), expected);
	}

	#[test]
	fn test_every_reduced_key_exists_in_desired() {
		fn check(desired: &Object, reduced: &Object) {
			for (key, value) in reduced {
				let desired_value = desired
					.get(key)
					.unwrap_or_else(|| panic!("key {key:?} not in desired"));
				if let (Value::Object(d), Value::Object(r)) = (desired_value, value) {
					check(d, r);
				}
			}
		}

		let desired = object(json!({
			"apiVersion": "v1",
			"kind": "Service",
			"metadata": {"name": "web", "labels": {"app": "web"}},
			"spec": {"ports": [{"port": 80}], "selector": {"app": "web"}}
		}));
		let live = object(json!({
			"apiVersion": "v1",
			"kind": "Service",
			"metadata": {
				"name": "web",
				"labels": {"app": "web", "injected": "yes"},
				"uid": "u",
				"creationTimestamp": "2024-01-01T00:00:00Z"
			},
			"spec": {
				"ports": [{"port": 80, "protocol": "TCP", "targetPort": 80}],
				"selector": {"app": "web"},
				"clusterIP": "10.0.0.1",
				"type": "ClusterIP"
			},
			"status": {"loadBalancer": {}}
		}));

		check(&desired, &subset(&desired, &live));
	}

	#[test]
	fn test_reduction_is_idempotent() {
		let desired = object(json!({
			"namespace": "ns",
			"apiVersion": "v1",
			"spec": {"list": [{"a": 1}, 2], "m": {"x": 1}}
		}));
		let live = object(json!({
			"namespace": "other",
			"apiVersion": "v2",
			"spec": {"list": [{"a": 3, "b": 4}, 5, {"tail": true}], "m": {"x": 2, "y": 3}},
			"status": {}
		}));

		let once = subset(&desired, &live);
		let twice = subset(&desired, &once);
		assert_eq!(once, twice);
	}

	#[test]
	fn test_inputs_are_not_modified() {
		let desired = object(json!({"a": {"b": 1}}));
		let live = object(json!({"a": {"b": 2, "c": 3}, "d": 4}));
		let live_before = live.clone();

		let _ = subset(&desired, &live);
		assert_eq!(live, live_before);
	}
}
