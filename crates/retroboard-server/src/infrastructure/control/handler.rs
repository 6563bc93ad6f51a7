//! Turns control requests into queued commands or query replies.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use retroboard_core::{Command, ProgramRegistry};

use crate::application::command_queue::CommandSender;
use crate::application::status::ManagerStatus;

use super::messages::{parse_request, validate, ControlError, ControlRequest, ControlResponse, Query};

/// Shared by every control session.
#[derive(Clone)]
pub struct ControlHandler {
    sender: CommandSender,
    status: watch::Receiver<ManagerStatus>,
    registry: Arc<ProgramRegistry>,
}

impl ControlHandler {
    pub fn new(
        sender: CommandSender,
        status: watch::Receiver<ManagerStatus>,
        registry: Arc<ProgramRegistry>,
    ) -> Self {
        Self {
            sender,
            status,
            registry,
        }
    }

    /// Handles one text frame and returns the reply to send back.
    pub fn handle(&self, text: &str) -> ControlResponse {
        match parse_request(text).and_then(|request| self.respond(request)) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "control request rejected");
                ControlResponse::Rejected {
                    error: e.to_string(),
                }
            }
        }
    }

    fn respond(&self, request: ControlRequest) -> Result<ControlResponse, ControlError> {
        match request {
            ControlRequest::Query(query) => self.answer(query),
            ControlRequest::Command(command) => {
                validate(&command, &self.registry)?;
                let action = command.action();
                self.enqueue(command)?;
                Ok(ControlResponse::Accepted {
                    action: action.to_string(),
                    enqueued: 1,
                })
            }
            ControlRequest::ConfigBatch(values) => {
                let enqueued = values.len();
                for (key, value) in values {
                    self.enqueue(Command::SetConfig { key, value })?;
                }
                Ok(ControlResponse::Accepted {
                    action: "config".to_string(),
                    enqueued,
                })
            }
        }
    }

    fn enqueue(&self, command: Command) -> Result<(), ControlError> {
        debug!(action = command.action(), "enqueueing command");
        if self.sender.enqueue(command) {
            Ok(())
        } else {
            Err(ControlError::ManagerUnavailable)
        }
    }

    fn answer(&self, query: Query) -> Result<ControlResponse, ControlError> {
        let status = self.status.borrow();
        let response = match query {
            Query::Status => ControlResponse::Status {
                status: status.clone(),
            },
            Query::Programs => ControlResponse::Programs {
                programs: self.registry.names(),
                current: status.current_program.clone(),
            },
            Query::ProgramConfig { program } => {
                if !self.registry.contains(&program) {
                    return Err(ControlError::UnknownProgram(program));
                }
                let config = status
                    .program_configs
                    .get(&program)
                    .cloned()
                    .unwrap_or_default();
                ControlResponse::ProgramConfig { program, config }
            }
            Query::Carousel => ControlResponse::Carousel {
                carousel: status.carousel.clone(),
            },
        };
        Ok(response)
    }
}
