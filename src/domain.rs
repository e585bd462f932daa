use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EnaError;

/// Taxonomy filter applied to the search query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxOperator {
    /// The taxon and all of its descendants.
    #[default]
    Subtree,
    /// Only the exact taxon.
    Exact,
}

impl TaxOperator {
    pub fn token(&self) -> &'static str {
        match self {
            TaxOperator::Subtree => "tax_tree",
            TaxOperator::Exact => "tax_eq",
        }
    }

    pub fn from_exact_flag(exact: bool) -> Self {
        if exact {
            TaxOperator::Exact
        } else {
            TaxOperator::Subtree
        }
    }
}

impl fmt::Display for TaxOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl FromStr for TaxOperator {
    type Err = EnaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "subtree" | "tax_tree" => Ok(TaxOperator::Subtree),
            "exact" | "tax_eq" => Ok(TaxOperator::Exact),
            _ => Err(EnaError::InvalidOperator(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tsv,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = EnaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(EnaError::InvalidFormat(value.to_string())),
        }
    }
}

pub const STDOUT_SENTINEL: &str = "-";

/// Where the raw response is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(Utf8PathBuf),
}

impl OutputTarget {
    /// Default artifact name for a taxonomy id.
    pub fn default_for(tax_id: &str, format: OutputFormat) -> Self {
        OutputTarget::File(Utf8PathBuf::from(format!(
            "ena_transcriptomics_{tax_id}.{}",
            format.extension()
        )))
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, OutputTarget::Stdout)
    }

    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::File(path) => Some(path),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "{STDOUT_SENTINEL}"),
            OutputTarget::File(path) => write!(f, "{path}"),
        }
    }
}

impl FromStr for OutputTarget {
    type Err = EnaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed == STDOUT_SENTINEL {
            return Ok(OutputTarget::Stdout);
        }
        if trimmed.is_empty() {
            return Err(EnaError::Filesystem("empty output path".to_string()));
        }
        Ok(OutputTarget::File(Utf8PathBuf::from(trimmed)))
    }
}
