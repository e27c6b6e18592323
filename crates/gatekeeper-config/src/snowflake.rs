// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Discord IDs show up both as JSON numbers (hand-written `config.json`) and
//! as strings (TOML, environment, Discord's own API). Accept either.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
	Number(u64),
	String(String),
}

pub(crate) fn parse_snowflake(key: &str, raw: &str) -> Result<u64, crate::ConfigError> {
	raw.trim()
		.parse()
		.map_err(|_| crate::ConfigError::InvalidValue {
			key: key.to_string(),
			message: format!("'{raw}' is not a numeric Discord ID"),
		})
}

pub(crate) fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<NumberOrString>::deserialize(deserializer)? {
		None => Ok(None),
		Some(NumberOrString::Number(n)) => Ok(Some(n)),
		Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
		Some(NumberOrString::String(s)) => s
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| serde::de::Error::custom(format!("'{s}' is not a numeric Discord ID"))),
	}
}

/// Same as [`deserialize_opt`] but keeps the value textual, for OAuth client
/// IDs that are only ever echoed back into URLs.
pub(crate) fn deserialize_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(
		match Option::<NumberOrString>::deserialize(deserializer)? {
			None => None,
			Some(NumberOrString::Number(n)) => Some(n.to_string()),
			Some(NumberOrString::String(s)) => Some(s).filter(|s| !s.is_empty()),
		},
	)
}
