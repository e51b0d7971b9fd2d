use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp format used for generated run identifiers
const RUN_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Identifier of one end-to-end pipeline run.
///
/// Generated once per invocation and passed explicitly to every stage, so all
/// artifacts of a run land under directories keyed by the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Create a run identifier from the current local time
    pub fn generate() -> Self {
        Self(Local::now().format(RUN_ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RunId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("Run id must not be empty");
        }
        if s == "." || s == ".." {
            anyhow::bail!("Run id '{}' is not a valid directory name", s);
        }
        if let Some(c) = s.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))) {
            anyhow::bail!("Run id '{}' contains unsupported character '{}'", s, c);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RunId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_valid() {
        let id = RunId::generate();
        assert_eq!(id.as_str().len(), "2024-11-10_08-30-00".len());
        assert!(id.as_str().parse::<RunId>().is_ok());
    }

    #[test]
    fn test_rejects_path_components() {
        assert!("".parse::<RunId>().is_err());
        assert!("..".parse::<RunId>().is_err());
        assert!("a/b".parse::<RunId>().is_err());
        assert!("2024-11-10 08:30".parse::<RunId>().is_err());
        assert!("2024-11-10_08-30-00".parse::<RunId>().is_ok());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = serde_json::to_string(&RunId::from_str("run-1").unwrap()).unwrap();
        assert_eq!(json, "\"run-1\"");
        assert!(serde_json::from_str::<RunId>("\"../etc\"").is_err());
    }
}
