//! Canonical YAML text for trees.
//!
//! Both sides of a diff go through [`to_yaml`], so the output must only depend
//! on the tree contents: keys are sorted at every level before serializing,
//! using the same natural ordering Go's yaml packages apply.

use std::{cmp::Ordering, iter::Peekable, str::Chars};

use serde_json::Value;
use tracing::instrument;

pub use serde_saphyr::ser_error::Error as YamlError;

/// Text an empty object serializes to.
pub const EMPTY_OBJECT: &str = "{}";

/// Serialize a tree to YAML with sorted keys.
#[instrument(skip_all)]
pub fn to_yaml(value: &Value) -> Result<String, YamlError> {
	let options = serde_saphyr::SerializerOptions {
		indent_step: 2,
		indent_array: Some(0),
		prefer_block_scalars: true,
		empty_map_as_braces: true,
		empty_array_as_brackets: true,
		line_width: Some(80),
		scientific_notation_threshold: Some(1000000),
		scientific_notation_small_threshold: Some(0.0001),
		quote_ambiguous_keys: true,
		quote_numeric_strings: true,
		..Default::default()
	};

	let mut output = String::new();
	serde_saphyr::to_fmt_writer_with_options(&mut output, &sorted(value), options)?;
	Ok(output)
}

/// Whether `text` is the serialized form of an empty object.
pub fn is_empty_object(text: &str) -> bool {
	text.trim() == EMPTY_OBJECT
}

fn sorted(value: &Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<_> = map.iter().collect();
			entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
			Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
		}
		Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
		other => other.clone(),
	}
}

/// Natural key order.
///
/// Runs of digits compare by numeric value. Where a letter meets a non-letter,
/// the non-letter sorts first, unless the shared prefix ended in a digit, in
/// which case the letter does (`a1b` < `a1_`, but `a_` < `ab`).
fn natural_cmp(a: &str, b: &str) -> Ordering {
	let mut a = a.chars().peekable();
	let mut b = b.chars().peekable();
	let mut after_digit = false;

	loop {
		let (ca, cb) = match (a.peek().copied(), b.peek().copied()) {
			(None, None) => return Ordering::Equal,
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(ca), Some(cb)) => (ca, cb),
		};

		if ca.is_ascii_digit() && cb.is_ascii_digit() {
			let ord = cmp_digit_runs(&mut a, &mut b);
			if ord != Ordering::Equal {
				return ord;
			}
			after_digit = true;
			continue;
		}

		if ca == cb {
			a.next();
			b.next();
			after_digit = false;
			continue;
		}

		return match (ca.is_alphabetic(), cb.is_alphabetic()) {
			(true, false) if after_digit => Ordering::Less,
			(true, false) => Ordering::Greater,
			(false, true) if after_digit => Ordering::Greater,
			(false, true) => Ordering::Less,
			_ => ca.cmp(&cb),
		};
	}
}

/// Consume one digit run from each side and compare them numerically.
///
/// Equal values with a different number of leading zeros order the shorter
/// run first.
fn cmp_digit_runs(a: &mut Peekable<Chars>, b: &mut Peekable<Chars>) -> Ordering {
	let run_a = take_digits(a);
	let run_b = take_digits(b);
	let trimmed_a = run_a.trim_start_matches('0');
	let trimmed_b = run_b.trim_start_matches('0');

	trimmed_a
		.len()
		.cmp(&trimmed_b.len())
		.then_with(|| trimmed_a.cmp(trimmed_b))
		.then_with(|| run_a.len().cmp(&run_b.len()))
}

fn take_digits(chars: &mut Peekable<Chars>) -> String {
	let mut run = String::new();
	while let Some(c) = chars.next_if(char::is_ascii_digit) {
		run.push(c);
	}
	run
}
