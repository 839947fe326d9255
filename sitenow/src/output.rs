//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use serde::Serialize;
use sitenow_core::CachedResponse;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(
        &self,
        data: &T,
        text_fn: impl FnOnce() -> String,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

/// One response rendered for the terminal.
///
/// Redirects print as `302 <location>`; bodies print in full when textual.
pub fn describe(response: &CachedResponse) -> String {
    match response {
        CachedResponse::Inline(sitenow_core::Body::Text(text)) => format!("200\n{}", text),
        other => other.to_string(),
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub algorithm: String,
}

/// A cache entry listed by `index`.
#[derive(Debug, Serialize)]
pub struct CacheEntryInfo {
    pub path: String,
    pub response: CachedResponse,
}

/// Output for `index` command.
#[derive(Debug, Serialize)]
pub struct IndexOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub entries: Vec<CacheEntryInfo>,
}

/// A resolved request for `resolve`.
#[derive(Debug, Serialize)]
pub struct ResolvedUri {
    pub uri: String,
    pub response: CachedResponse,
}

/// Output for `resolve` command.
#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    pub success: bool,
    pub result_code: u8,
    pub cached: bool,
    pub results: Vec<ResolvedUri>,
}

/// Output for `watch` command once the initial preprocess is done.
#[derive(Debug, Serialize)]
pub struct WatchReadyOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub entries: usize,
}
