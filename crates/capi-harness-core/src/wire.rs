// crates/capi-harness-core/src/wire.rs
// ============================================================================
// Module: Scheduler Wire Model
// Description: Task-desire binary messages and completion-callback payloads.
// Purpose: Share one encoding between the target stand-in and the simulator.
// Dependencies: prost, serde, thiserror
// ============================================================================

//! ## Overview
//! The target asks the scheduler to run a task by POSTing a protobuf
//! [`DesireTaskRequest`] to [`DESIRE_TASK_PATH`]. Once the task finishes the
//! scheduler POSTs a JSON [`TaskCallbackRequest`] to the completion callback
//! URL carried in the task definition.
//!
//! Only the fields the harness reads are modelled; unknown fields are
//! skipped by the protobuf decoder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use prost::Message;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Path the target POSTs task-desire messages to.
pub const DESIRE_TASK_PATH: &str = "/v1/tasks/desire.r2";

/// Content type used for task-desire messages.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

// ============================================================================
// SECTION: Task Desire (protobuf)
// ============================================================================

/// Request instructing the scheduler to run a task.
#[derive(Clone, PartialEq, Message)]
pub struct DesireTaskRequest {
    /// Task definition.
    #[prost(message, optional, tag = "1")]
    pub task_definition: Option<TaskDefinition>,
    /// Task identifier.
    #[prost(string, tag = "2")]
    pub task_guid: String,
    /// Scheduling domain.
    #[prost(string, tag = "3")]
    pub domain: String,
}

/// Subset of a scheduler task definition.
#[derive(Clone, PartialEq, Message)]
pub struct TaskDefinition {
    /// Root filesystem reference.
    #[prost(string, tag = "1")]
    pub root_fs: String,
    /// Disk limit in MB.
    #[prost(int32, tag = "4")]
    pub disk_mb: i32,
    /// Memory limit in MB.
    #[prost(int32, tag = "5")]
    pub memory_mb: i32,
    /// Relative CPU weight.
    #[prost(uint32, tag = "6")]
    pub cpu_weight: u32,
    /// Whether the container runs privileged.
    #[prost(bool, tag = "7")]
    pub privileged: bool,
    /// Log source label.
    #[prost(string, tag = "8")]
    pub log_source: String,
    /// Log correlation identifier.
    #[prost(string, tag = "9")]
    pub log_guid: String,
    /// Metrics correlation identifier.
    #[prost(string, tag = "10")]
    pub metrics_guid: String,
    /// File whose contents become the task result.
    #[prost(string, tag = "11")]
    pub result_file: String,
    /// URL the scheduler calls once the task completes.
    #[prost(string, tag = "12")]
    pub completion_callback_url: String,
    /// Opaque annotation.
    #[prost(string, tag = "13")]
    pub annotation: String,
}

/// Failure to decode a task-desire message.
#[derive(Debug, Error)]
pub enum TaskDesireDecodeError {
    /// Payload is not a valid protobuf encoding.
    #[error("malformed task desire payload: {0}")]
    Malformed(#[from] prost::DecodeError),
    /// Payload decoded but carries no task identifier.
    #[error("task desire is missing task_guid")]
    MissingTaskGuid,
    /// Payload decoded but carries no task definition.
    #[error("task desire {task_guid} is missing task_definition")]
    MissingDefinition {
        /// Task identifier.
        task_guid: String,
    },
    /// Payload decoded but carries no completion callback URL.
    #[error("task desire {task_guid} is missing completion_callback_url")]
    MissingCallbackUrl {
        /// Task identifier.
        task_guid: String,
    },
}

impl DesireTaskRequest {
    /// Builds a minimal request for a task with a completion callback.
    #[must_use]
    pub fn new(task_guid: impl Into<String>, completion_callback_url: impl Into<String>) -> Self {
        Self {
            task_definition: Some(TaskDefinition {
                completion_callback_url: completion_callback_url.into(),
                ..TaskDefinition::default()
            }),
            task_guid: task_guid.into(),
            domain: "cf-tasks".to_string(),
        }
    }

    /// Decodes and validates a task-desire message.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDesireDecodeError`] when the bytes are not a valid
    /// encoding or when the task identifier, definition, or callback URL is
    /// absent.
    pub fn decode_validated(bytes: &[u8]) -> Result<Self, TaskDesireDecodeError> {
        let request = Self::decode(bytes)?;
        if request.task_guid.is_empty() {
            return Err(TaskDesireDecodeError::MissingTaskGuid);
        }
        let Some(definition) = request.task_definition.as_ref() else {
            return Err(TaskDesireDecodeError::MissingDefinition {
                task_guid: request.task_guid,
            });
        };
        if definition.completion_callback_url.is_empty() {
            return Err(TaskDesireDecodeError::MissingCallbackUrl {
                task_guid: request.task_guid,
            });
        }
        Ok(request)
    }

    /// Returns the completion callback URL, empty when no definition is set.
    #[must_use]
    pub fn completion_callback_url(&self) -> &str {
        self.task_definition
            .as_ref()
            .map_or("", |definition| definition.completion_callback_url.as_str())
    }
}

// ============================================================================
// SECTION: Completion Callback (JSON)
// ============================================================================

/// Completion callback body POSTed back to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCallbackRequest {
    /// Task identifier.
    pub task_guid: String,
    /// Lifecycle result.
    pub result: TaskCallbackResult,
}

/// Lifecycle result embedded in a completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCallbackResult {
    /// Task identifier.
    pub task_guid: String,
    /// Opaque execution metadata.
    pub execution_metadata: String,
    /// Process type to start command map; always present, possibly empty.
    pub process_types: BTreeMap<String, String>,
    /// Lifecycle type label (for example `docker`).
    pub lifecycle_type: String,
    /// Lifecycle-specific metadata.
    pub lifecycle_metadata: LifecycleMetadata,
}

/// Container-image lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleMetadata {
    /// Container image reference.
    pub docker_image: String,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
