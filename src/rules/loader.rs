//! Ruleset source loading
//!
//! A source is a local file path or an HTTP(S) URL yielding one YAML
//! ruleset document. Sources are independent: a fetch or parse failure
//! skips that source with a warning and the others still merge.

use crate::error::VigilError;
use crate::rules::types::RulesetDocument;
use tracing::debug;

/// Whether a source string names a remote document
fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch and parse one ruleset source
///
/// # Errors
///
/// Returns [`VigilError::Source`] on fetch or parse failure; the caller
/// decides whether to fall back to a cached document.
pub async fn load_source(
    client: &reqwest::Client,
    source: &str,
) -> Result<RulesetDocument, VigilError> {
    let body = if is_url(source) {
        debug!(source = source, "Fetching remote ruleset source");
        let response = client
            .get(source)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| VigilError::Source {
                source_path: source.to_string(),
                reason: e.to_string(),
            })?;
        response.text().await.map_err(|e| VigilError::Source {
            source_path: source.to_string(),
            reason: e.to_string(),
        })?
    } else {
        debug!(source = source, "Reading local ruleset source");
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| VigilError::Source {
                source_path: source.to_string(),
                reason: e.to_string(),
            })?
    };

    serde_yaml::from_str(&body).map_err(|e| VigilError::Source {
        source_path: source.to_string(),
        reason: e.to_string(),
    })
}
