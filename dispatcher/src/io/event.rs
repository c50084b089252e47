//! Dispatch event loading (schema + typed parse).

use std::fs;
use std::path::Path;

use anyhow::Context;
use jsonschema::Draft;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::outcome::Action;
use crate::core::request::{MutationRequest, RepoId};
use crate::error::DispatchError;

pub const DISPATCH_EVENT_NAME: &str = "repository_dispatch";

const EVENT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/dispatch_event/v1.schema.json"
));

#[derive(Debug, Deserialize)]
struct RawEvent {
    action: String,
    client_payload: RawPayload,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    pr: PrNumber,
    #[serde(default)]
    input_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrNumber {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    full_name: String,
}

/// Read the event file and turn it into a request.
pub fn load_event(event_name: &str, path: &Path) -> Result<MutationRequest, DispatchError> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read event {}", path.display()))?;
    parse_event(event_name, &contents)
}

/// Validate and parse a dispatch event payload.
pub fn parse_event(event_name: &str, contents: &str) -> Result<MutationRequest, DispatchError> {
    let event_name = event_name.to_lowercase();
    info!(event = %event_name, "github event");
    if event_name != DISPATCH_EVENT_NAME {
        return Err(DispatchError::InvalidEvent(format!(
            "GitHub event {event_name} cannot be processed"
        )));
    }

    let value: Value = serde_json::from_str(contents)
        .map_err(|err| DispatchError::InvalidEvent(format!("parse event json: {err}")))?;
    validate_schema(&value)?;
    let raw: RawEvent = serde_json::from_value(value)
        .map_err(|err| DispatchError::InvalidEvent(format!("deserialize event: {err}")))?;
    debug!(?raw, "event data");

    let action = Action::parse(&raw.action).ok_or_else(|| {
        DispatchError::InvalidEvent(format!(
            "dispatch action {} cannot be processed",
            raw.action
        ))
    })?;
    let pr_number = match raw.client_payload.pr {
        PrNumber::Number(n) => n,
        PrNumber::Text(text) => text.trim().parse::<u64>().map_err(|err| {
            DispatchError::InvalidEvent(format!("pull request number '{text}': {err}"))
        })?,
    };
    if pr_number == 0 {
        return Err(DispatchError::InvalidEvent(
            "pull request number must be positive".to_string(),
        ));
    }
    let repo = RepoId::parse(&raw.repository.full_name)
        .map_err(|err| DispatchError::InvalidEvent(err.to_string()))?;

    Ok(MutationRequest::new(
        action,
        pr_number,
        repo,
        raw.client_payload.input_version.as_deref(),
    ))
}

/// Validate JSON instance against the bundled event schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<(), DispatchError> {
    let schema: Value = serde_json::from_str(EVENT_SCHEMA).context("parse event schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| anyhow::anyhow!("compile event schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(DispatchError::InvalidEvent(format!(
            "schema validation failed:\n- {}",
            messages.join("\n- ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: &str, payload: &str) -> String {
        format!(
            r#"{{"action": "{action}", "client_payload": {payload}, "repository": {{"full_name": "conda-forge/pkg-feedstock"}}}}"#
        )
    }

    #[test]
    fn parses_rerender_with_string_pr() {
        let request =
            parse_event("repository_dispatch", &event("rerender", r#"{"pr": "12"}"#)).expect("parse");
        assert_eq!(request.action(), Action::Rerender);
        assert_eq!(request.pr_number(), 12);
        assert_eq!(request.repo().to_string(), "conda-forge/pkg-feedstock");
        assert_eq!(request.explicit_version(), None);
    }

    #[test]
    fn parses_version_update_with_null_sentinel() {
        let request = parse_event(
            "Repository_Dispatch",
            &event("version_update", r#"{"pr": 3, "input_version": "null"}"#),
        )
        .expect("parse");
        assert_eq!(request.action(), Action::VersionUpdate);
        assert_eq!(request.explicit_version(), None);

        let request = parse_event(
            "repository_dispatch",
            &event("version_update", r#"{"pr": 3, "input_version": "2.0.1"}"#),
        )
        .expect("parse");
        assert_eq!(request.explicit_version(), Some("2.0.1"));
    }

    #[test]
    fn rejects_other_event_names() {
        let err = parse_event("push", &event("rerender", r#"{"pr": 1}"#)).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidEvent(_)));
    }

    #[test]
    fn rejects_unknown_action() {
        let err = parse_event("repository_dispatch", &event("lint", r#"{"pr": 1}"#)).unwrap_err();
        assert!(err.to_string().contains("lint cannot be processed"));
    }

    #[test]
    fn schema_rejects_non_numeric_pr() {
        let err =
            parse_event("repository_dispatch", &event("rerender", r#"{"pr": "abc"}"#)).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn schema_rejects_missing_repository() {
        let err = parse_event(
            "repository_dispatch",
            r#"{"action": "rerender", "client_payload": {"pr": 1}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidEvent(_)));
    }

    #[test]
    fn load_event_reads_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("event.json");
        fs::write(&path, event("rerender", r#"{"pr": 5}"#)).expect("write");
        let request = load_event("repository_dispatch", &path).expect("load");
        assert_eq!(request.pr_number(), 5);
    }
}
