//! Annotation commands and applier options, loadable from JSON or TOML.
//!
//! ```toml
//! [options]
//! normalize = true
//!
//! [commands.bold]
//! tag_names = ["b", "strong"]
//! class_name = "bold"
//!
//! [commands.color]
//! tag_names = ["span"]
//! class_name = "color-red"
//! similar_class_pattern = "color-[a-z]+"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use miette::Diagnostic;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::applier::Applier;
use crate::descriptor::AnnotationDescriptor;

/// Tuning shared by every applier built from one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplierOptions {
    /// Merge adjacent equivalent markers and text after each command.
    pub normalize: bool,
    /// How many ancestors to inspect when looking for an enclosing marker.
    pub max_ancestor_depth: usize,
}

impl Default for ApplierOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            max_ancestor_depth: 64,
        }
    }
}

/// Serialized form of an [`AnnotationDescriptor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    #[serde(default)]
    pub tag_names: Vec<String>,
    #[serde(default)]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_class_pattern: Option<String>,
}

impl DescriptorSpec {
    /// Build the descriptor, compiling the similar-class pattern if any.
    pub fn compile(&self, command: &str) -> Result<AnnotationDescriptor, ConfigError> {
        let descriptor = AnnotationDescriptor::new(&self.tag_names, &self.class_name);
        match &self.similar_class_pattern {
            Some(pattern) => {
                let pattern = Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    command: command.to_string(),
                    source,
                })?;
                Ok(descriptor.with_similar_classes(pattern))
            }
            None => Ok(descriptor),
        }
    }
}

/// Named annotation commands plus the options their appliers share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub options: ApplierOptions,
    pub commands: BTreeMap<String, DescriptorSpec>,
}

impl AnnotationConfig {
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read a configuration file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let read = || {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&read()?)?,
            Some("toml") => Self::from_toml(&read()?)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        tracing::debug!(
            target: "loom::config",
            path = %path.display(),
            commands = config.commands.len(),
            "loaded annotation config"
        );
        Ok(config)
    }

    pub fn descriptor(&self, command: &str) -> Result<AnnotationDescriptor, ConfigError> {
        self.commands
            .get(command)
            .ok_or_else(|| ConfigError::UnknownCommand(command.to_string()))?
            .compile(command)
    }

    /// A ready applier for `command`, using the shared options.
    pub fn applier(&self, command: &str) -> Result<Applier, ConfigError> {
        let descriptor = self.descriptor(command)?;
        Ok(Applier::with_options(descriptor, self.options.clone()))
    }
}

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(loom::config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {0}")]
    #[diagnostic(
        code(loom::config::format),
        help("use a .json or .toml file")
    )]
    UnsupportedFormat(String),

    #[error("invalid JSON config: {0}")]
    #[diagnostic(code(loom::config::json))]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    #[diagnostic(code(loom::config::toml))]
    Toml(#[from] toml::de::Error),

    #[error("invalid similar-class pattern for command `{command}`: {source}")]
    #[diagnostic(code(loom::config::pattern))]
    Pattern {
        command: String,
        #[source]
        source: regex::Error,
    },

    #[error("no annotation command named `{0}`")]
    #[diagnostic(code(loom::config::unknown_command))]
    UnknownCommand(String),
}
