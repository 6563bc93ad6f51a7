//! JSON message types for the control endpoint.
//!
//! # Requests
//!
//! A text frame is either a command, discriminated by `"action"`, or a query,
//! discriminated by `"query"`:
//!
//! ```json
//! {"action":"switch","program":"clock","config":{"color":[0,255,255]}}
//! {"action":"config_batch","values":{"text":"Hi","speed":2}}
//! {"query":"status"}
//! {"query":"program_config","program":"scroll_text"}
//! ```
//!
//! `config_batch` is not a manager command: it fans out into one `config`
//! command per key.
//!
//! # Responses
//!
//! Every response carries a `"type"` field:
//!
//! ```json
//! {"type":"accepted","action":"switch","enqueued":1}
//! {"type":"rejected","error":"unknown program `nope`"}
//! {"type":"programs","programs":["clock","stars"],"current":"clock"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use retroboard_core::{Command, PersistedCarousel, ProgramConfig, ProgramRegistry};

use crate::application::status::ManagerStatus;

/// Read-only requests, answered from the latest published status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum Query {
    /// The full [`ManagerStatus`].
    Status,
    /// Registered program names and the active one.
    Programs,
    /// Stored configuration of one program.
    ProgramConfig {
        #[serde(alias = "app")]
        program: String,
    },
    /// Carousel configuration.
    Carousel,
}

/// A parsed control request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    Query(Query),
    Command(Command),
    /// One `config` command per key, in key order.
    ConfigBatch(ProgramConfig),
}

/// Why a request was rejected.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(#[source] serde_json::Error),

    #[error("invalid command: {0}")]
    InvalidCommand(#[source] serde_json::Error),

    #[error("unknown program `{0}`")]
    UnknownProgram(String),

    #[error("brightness must be between 0 and 100, got {0}")]
    BrightnessOutOfRange(i64),

    #[error("carousel enabled but no programs specified")]
    EmptyPlaylist,

    #[error("duration for `{program}` must be a positive number of seconds")]
    InvalidDuration { program: String },

    #[error("missing configuration data")]
    EmptyConfig,

    #[error("`{0}` is not accepted over the control connection")]
    NotAllowed(&'static str),

    #[error("the application manager is not running")]
    ManagerUnavailable,
}

/// Replies sent back for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Accepted {
        action: String,
        /// Number of commands queued for this request.
        enqueued: usize,
    },
    Rejected {
        error: String,
    },
    Status {
        status: ManagerStatus,
    },
    Programs {
        programs: Vec<String>,
        current: Option<String>,
    },
    ProgramConfig {
        program: String,
        config: ProgramConfig,
    },
    Carousel {
        carousel: PersistedCarousel,
    },
}

#[derive(Deserialize)]
struct ConfigBatch {
    #[serde(default)]
    values: ProgramConfig,
}

/// Parses one text frame.
///
/// # Errors
///
/// Returns a [`ControlError`] describing why the frame is not a well-formed
/// request.
pub fn parse_request(text: &str) -> Result<ControlRequest, ControlError> {
    let value: Value = serde_json::from_str(text).map_err(ControlError::InvalidJson)?;

    if value.get("query").is_some() {
        return serde_json::from_value(value)
            .map(ControlRequest::Query)
            .map_err(ControlError::InvalidQuery);
    }

    if value.get("action").and_then(Value::as_str) == Some("config_batch") {
        let batch: ConfigBatch =
            serde_json::from_value(value).map_err(ControlError::InvalidCommand)?;
        if batch.values.is_empty() {
            return Err(ControlError::EmptyConfig);
        }
        return Ok(ControlRequest::ConfigBatch(batch.values));
    }

    serde_json::from_value(value)
        .map(ControlRequest::Command)
        .map_err(ControlError::InvalidCommand)
}

/// Checks a command against the registry before it is enqueued.
///
/// # Errors
///
/// Returns the first rule the command violates.
pub fn validate(command: &Command, registry: &ProgramRegistry) -> Result<(), ControlError> {
    let known = |program: &str| {
        if registry.contains(program) {
            Ok(())
        } else {
            Err(ControlError::UnknownProgram(program.to_string()))
        }
    };

    match command {
        Command::Switch { program, .. } | Command::SetProgramConfig { program, .. } => {
            known(program)
        }
        Command::SetSettings { brightness } => {
            if (0..=100).contains(brightness) {
                Ok(())
            } else {
                Err(ControlError::BrightnessOutOfRange(*brightness))
            }
        }
        Command::SetCarousel { enabled, playlist } => {
            if *enabled && playlist.is_empty() {
                return Err(ControlError::EmptyPlaylist);
            }
            for entry in playlist {
                known(&entry.program)?;
                if entry.duration().is_none() {
                    return Err(ControlError::InvalidDuration {
                        program: entry.program.clone(),
                    });
                }
            }
            Ok(())
        }
        Command::Quit => Err(ControlError::NotAllowed("quit")),
        Command::Stop | Command::SetConfig { .. } => Ok(()),
    }
}
