// crates/capi-harness-config/src/synthesize.rs
// ============================================================================
// Module: Config Synthesis
// Description: Render a base template plus overlay into a scoped config file.
// Purpose: Give each harness instance its own disposable target config.
// Dependencies: serde_yaml, tempfile
// ============================================================================

//! ## Overview
//! Synthesis parses the base template, applies a [`ConfigOverlay`] in order,
//! and persists the result under a unique file name. The file is written
//! through a temp file that is deleted on any failure, so a failed synthesis
//! never leaves a partial config behind. Removal is idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::document::ConfigDocument;
use crate::error::ConfigError;
use crate::overlay::ConfigOverlay;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File name prefix for synthesized configs.
pub const CONFIG_FILE_PREFIX: &str = "target-config-";

/// File name suffix for synthesized configs.
pub const CONFIG_FILE_SUFFIX: &str = ".yml";

// ============================================================================
// SECTION: Synthesizer
// ============================================================================

/// Renders configs from one base template.
#[derive(Debug, Clone)]
pub struct ConfigSynthesizer {
    /// Base template text.
    template: String,
    /// Directory receiving synthesized files.
    output_dir: PathBuf,
}

impl ConfigSynthesizer {
    /// Creates a synthesizer writing into the system temp directory.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            output_dir: std::env::temp_dir(),
        }
    }

    /// Creates a synthesizer from a template file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the template cannot be read.
    pub fn from_template_file(path: &Path) -> Result<Self, ConfigError> {
        let template = fs::read_to_string(path).map_err(|err| {
            ConfigError::Io(format!("failed to read template {}: {err}", path.display()))
        })?;
        Ok(Self::new(template))
    }

    /// Sets the directory synthesized files are written to.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Returns the base template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Renders and persists a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on template parse, override, render, or write
    /// failure.
    pub fn synthesize(&self, overlay: ConfigOverlay) -> Result<SynthesizedConfig, ConfigError> {
        synthesize(&self.template, overlay, &self.output_dir)
    }
}

// ============================================================================
// SECTION: Synthesized Config
// ============================================================================

/// A persisted, synthesized config file.
#[derive(Debug, Clone)]
pub struct SynthesizedConfig {
    /// Location of the written file.
    path: PathBuf,
    /// Document as written.
    document: ConfigDocument,
}

impl SynthesizedConfig {
    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the document that was written.
    #[must_use]
    pub const fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Removes the file; succeeds when it is already gone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for failures other than "not found".
    pub fn remove(&self) -> Result<(), ConfigError> {
        remove_config(&self.path)
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Applies `overlay` to `template` without touching the filesystem.
///
/// # Errors
///
/// Returns [`ConfigError`] when the template does not parse or an override
/// fails.
pub fn render(template: &str, overlay: ConfigOverlay) -> Result<ConfigDocument, ConfigError> {
    let mut document = ConfigDocument::parse(template)?;
    overlay.apply_to(&mut document)?;
    Ok(document)
}

/// Renders `template` with `overlay` and writes it to a unique file in `dir`.
///
/// # Errors
///
/// Returns [`ConfigError`] on template parse, override, render, or write
/// failure. No file is left behind on failure.
pub fn synthesize(
    template: &str,
    overlay: ConfigOverlay,
    dir: &Path,
) -> Result<SynthesizedConfig, ConfigError> {
    let document = render(template, overlay)?;
    let yaml = document.to_yaml()?;
    let path = persist(dir, yaml.as_bytes())?;
    Ok(SynthesizedConfig {
        path,
        document,
    })
}

/// Removes a synthesized config file. Missing files are not an error.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for failures other than "not found".
pub fn remove_config(path: &Path) -> Result<(), ConfigError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(ConfigError::Io(format!("failed to remove config {}: {err}", path.display())))
        }
    }
}

/// Writes bytes to a uniquely named file, deleting it again on failure.
fn persist(dir: &Path, bytes: &[u8]) -> Result<PathBuf, ConfigError> {
    let io_err = |err: io::Error| {
        ConfigError::Io(format!("failed to write config in {}: {err}", dir.display()))
    };
    let mut file = tempfile::Builder::new()
        .prefix(CONFIG_FILE_PREFIX)
        .suffix(CONFIG_FILE_SUFFIX)
        .tempfile_in(dir)
        .map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    let (_, path) = file.keep().map_err(|err| io_err(err.error))?;
    Ok(path)
}
