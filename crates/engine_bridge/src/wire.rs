//! Line-delimited JSON protocol spoken by command-driven engines.
//!
//! Requests go to the engine's stdin as one object per line. Events come back
//! on stdout shaped `{"type": "<kind>", ...payload}`; lines that are not JSON
//! are engine diagnostics and are not events.

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{Detail, ReconstructionRequest},
    protocol::{EngineEvent, ReconstructionResult, SampleId},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("engine event is missing its \"type\" field: {line}")]
    MissingType { line: String },
    #[error("malformed {kind} event: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRequest<'a> {
    ModelFile {
        output: &'a std::path::Path,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<Detail>,
    },
}

#[derive(Deserialize)]
struct ProgressPayload {
    fraction: f64,
}

#[derive(Deserialize)]
struct RequestCompletePayload {
    #[serde(default)]
    model_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct RequestErrorPayload {
    error: String,
}

#[derive(Deserialize)]
struct InvalidSamplePayload {
    id: SampleId,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct SkippedSamplePayload {
    id: SampleId,
}

/// Encodes one request as a single protocol line, newline included.
pub fn encode_request(request: &ReconstructionRequest) -> Result<String, WireError> {
    let wire = WireRequest::ModelFile {
        output: &request.output_path,
        detail: request.detail,
    };
    let mut line = serde_json::to_string(&wire)?;
    line.push('\n');
    Ok(line)
}

/// Parses one stdout line.
///
/// `Ok(None)` for blank lines and anything that is not a JSON object. Unknown `type` values become
/// [`EngineEvent::Unrecognized`] so the caller decides how to treat them.
pub fn parse_event_line(line: &str) -> Result<Option<EngineEvent>, WireError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => value,
        _ => return Ok(None),
    };
    let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_owned) else {
        return Err(WireError::MissingType {
            line: trimmed.to_string(),
        });
    };

    let event = match kind.as_str() {
        "progress" => {
            let payload: ProgressPayload = decode_payload(&kind, value)?;
            EngineEvent::RequestProgress {
                fraction: payload.fraction,
            }
        }
        "processing_complete" => EngineEvent::ProcessingComplete,
        "input_complete" => EngineEvent::InputComplete,
        "request_complete" => {
            let raw = value.to_string();
            let payload: RequestCompletePayload = decode_payload(&kind, value)?;
            let result = match payload.model_file {
                Some(path) => ReconstructionResult::ModelFile(path),
                None => ReconstructionResult::Unexpected(raw),
            };
            EngineEvent::RequestComplete { result }
        }
        "request_error" => {
            let payload: RequestErrorPayload = decode_payload(&kind, value)?;
            EngineEvent::RequestError {
                error: payload.error,
            }
        }
        "invalid_sample" => {
            let payload: InvalidSamplePayload = decode_payload(&kind, value)?;
            EngineEvent::InvalidSample {
                id: payload.id,
                reason: payload.reason,
            }
        }
        "skipped_sample" => {
            let payload: SkippedSamplePayload = decode_payload(&kind, value)?;
            EngineEvent::SkippedSample { id: payload.id }
        }
        "automatic_downsampling" => EngineEvent::AutomaticDownsampling,
        "processing_cancelled" => EngineEvent::ProcessingCancelled,
        _ => EngineEvent::Unrecognized { kind },
    };
    Ok(Some(event))
}

fn decode_payload<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T, WireError> {
    serde_json::from_value(value).map_err(|source| WireError::Malformed {
        kind: kind.to_string(),
        source,
    })
}
