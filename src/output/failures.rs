//! Failure log: documents that did not make it into the index

use crate::index::IndexFailure;
use std::fmt;

/// Pipeline stage a document failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Retrieval,
    Extraction,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Retrieval => f.write_str("retrieval"),
            FailureStage::Extraction => f.write_str("extraction"),
        }
    }
}

/// One failed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub filename: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl FailureRecord {
    pub fn retrieval(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            stage: FailureStage::Retrieval,
            reason: reason.into(),
        }
    }
}

impl From<&IndexFailure> for FailureRecord {
    fn from(failure: &IndexFailure) -> Self {
        Self {
            filename: failure.filename.clone(),
            stage: FailureStage::Extraction,
            reason: failure.reason.clone(),
        }
    }
}

/// Renders the failure log
pub fn render_failure_log(failures: &[FailureRecord]) -> String {
    let mut out = String::from("Documents that failed retrieval or text extraction:\n\n");
    for failure in failures {
        out.push_str(&format!(
            "{}  [{}] {}\n",
            failure.filename, failure.stage, failure.reason
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DocumentKey;

    #[test]
    fn test_render_failure_log() {
        let extraction = IndexFailure {
            document_key: DocumentKey::new("giuffre", "2"),
            filename: "giuffre_2_Exhibit.pdf".to_string(),
            reason: "unparsable PDF".to_string(),
        };
        let failures = vec![
            FailureRecord::retrieval("giuffre_1_Order.pdf", "blocked: HTTP 403"),
            FailureRecord::from(&extraction),
        ];

        let log = render_failure_log(&failures);
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "giuffre_1_Order.pdf  [retrieval] blocked: HTTP 403");
        assert_eq!(lines[3], "giuffre_2_Exhibit.pdf  [extraction] unparsable PDF");
    }

    #[test]
    fn test_empty_failure_log_has_header_only() {
        let log = render_failure_log(&[]);
        assert_eq!(log.lines().count(), 2);
    }
}
