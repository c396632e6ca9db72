//! Access settings for the built-in collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Static bearer tokens.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Token → user id.
    pub tokens: BTreeMap<String, String>,
}
