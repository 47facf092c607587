//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to serve source listings and documents and run
//! the pipeline end-to-end against a temporary run directory.

mod pipeline_tests;
mod resume_tests;

use docket_harvest::config::load_config;
use docket_harvest::extract::{ExtractionResult, RawArtifact, TextExtractor};
use docket_harvest::{Config, Pipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Treats artifacts as UTF-8 text; artifacts starting with `%CORRUPT` fail
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, artifact: &RawArtifact) -> ExtractionResult {
        if artifact.bytes.starts_with(b"%CORRUPT") {
            return ExtractionResult::failed(artifact.key.clone(), "unparsable PDF: bad header");
        }
        ExtractionResult::text(
            artifact.key.clone(),
            String::from_utf8_lossy(&artifact.bytes).to_string(),
        )
    }
}

/// Writes a harvest configuration with fast test timings and the given sources
pub fn write_config(dir: &Path, concurrency: u32, sources: &str) -> PathBuf {
    let contents = format!(
        r#"
[harvester]
page-delay-ms = 0
fetch-delay-ms = 0
max-retries = 3
retry-backoff-ms = 10
request-timeout-secs = 5
max-concurrent-fetches = {concurrency}
on-challenge = "skip"

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
directory = "{directory}"

{sources}
"#,
        concurrency = concurrency,
        directory = dir.join("run").display(),
        sources = sources
    );

    let path = dir.join("harvest.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

/// A `url-list` source over the given paths of `base`
pub fn url_list_source(id: &str, label: &str, base: &str, paths: &[&str]) -> String {
    let urls: Vec<String> = paths
        .iter()
        .map(|p| format!("\"{}{}\"", base, p))
        .collect();
    format!(
        "[[source]]\nid = \"{}\"\nlabel = \"{}\"\nkind = \"url-list\"\nurls = [{}]\n",
        id,
        label,
        urls.join(", ")
    )
}

pub fn load(path: &Path) -> Config {
    load_config(path).unwrap()
}

/// Pipeline over the configuration at `path` with the plain text extractor
pub fn pipeline(path: &Path) -> Pipeline {
    Pipeline::new(load(path), "test-hash")
        .unwrap()
        .with_extractor(Arc::new(PlainTextExtractor))
}
