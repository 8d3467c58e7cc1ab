//! The tracked pipeline handle: validation against the library's own
//! predicate and named-method lifecycle invocation.

use std::fmt;

use mlua::{Function, Table, Value};

use crate::error::{CapturedError, RadioError, RadioResult};
use crate::runtime::Runtime;

/// The four lifecycle methods a Pipeline exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    Stop,
    Wait,
    Status,
}

impl Operation {
    /// Name of the method invoked on the handle.
    pub fn method_name(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Wait => "wait",
            Operation::Status => "status",
        }
    }

    /// Completes "no Pipeline loaded to ...".
    pub fn purpose(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Wait => "wait on",
            Operation::Status => "query status",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Snapshot returned by a pipeline's `status()` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatus {
    pub running: bool,
}

/// A script value the library recognised as a Pipeline.
///
/// The value lives inside the runtime that produced it, so a handle must
/// never outlive (or be used with) any other [`Runtime`].
#[derive(Debug)]
pub struct PipelineHandle {
    value: Value,
}

impl PipelineHandle {
    /// Accept `value` only if `radio.class.isinstanceof(value, radio.CompositeBlock)`
    /// returns boolean `true`. Truthy non-boolean results, a library without
    /// the predicate, or a predicate that raises all reject the value.
    pub fn validate(runtime: &Runtime, value: Value) -> RadioResult<Self> {
        match is_pipeline(runtime, &value) {
            Ok(true) => Ok(Self { value }),
            Ok(false) => {
                tracing::debug!(type_name = value.type_name(), "value is not a Pipeline");
                Err(RadioError::Validation)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Pipeline predicate failed");
                Err(RadioError::Validation)
            }
        }
    }

    /// Call the method named after `operation` with the handle as `self`.
    pub fn invoke(&self, runtime: &Runtime, operation: Operation) -> RadioResult<Vec<Value>> {
        tracing::debug!(%operation, "invoking pipeline method");
        runtime
            .call_method(&self.value, operation.method_name())
            .map_err(|error| RadioError::Lifecycle { operation, error })
    }

    /// `status()`, requiring a table with a boolean `running` field.
    pub fn status(&self, runtime: &Runtime) -> RadioResult<PipelineStatus> {
        let values = self.invoke(runtime, Operation::Status)?;
        parse_status(values.into_iter().next())
    }
}

fn is_pipeline(runtime: &Runtime, value: &Value) -> Result<bool, CapturedError> {
    let library = runtime.library()?;
    let class: Table = library.get("class")?;
    let isinstanceof: Function = class.get("isinstanceof")?;
    let composite: Value = library.get("CompositeBlock")?;
    let verdict = runtime
        .protected_call(&isinstanceof, vec![value.clone(), composite])?
        .into_iter()
        .next()
        .unwrap_or(Value::Nil);
    Ok(matches!(verdict, Value::Boolean(true)))
}

fn parse_status(value: Option<Value>) -> RadioResult<PipelineStatus> {
    let table = match value {
        Some(Value::Table(table)) => table,
        Some(other) => {
            return Err(RadioError::MalformedStatus(format!(
                "a {} value",
                other.type_name()
            )))
        }
        None => return Err(RadioError::MalformedStatus("no value".to_string())),
    };
    match table.get::<Value>("running") {
        Ok(Value::Boolean(running)) => Ok(PipelineStatus { running }),
        _ => Err(RadioError::MalformedStatus(
            "a table without a boolean 'running' field".to_string(),
        )),
    }
}
