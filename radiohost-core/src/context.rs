//! The context: one runtime, one error channel and at most one tracked
//! pipeline.

use std::ffi::CStr;

use mlua::Value;

use crate::config::ContextConfig;
use crate::error::{RadioError, RadioResult};
use crate::error_channel::ErrorChannel;
use crate::pipeline::{Operation, PipelineHandle, PipelineStatus};
use crate::runtime::Runtime;

/// Unit of ownership for a scripted pipeline.
///
/// Not safe for concurrent use: every call takes `&mut self`, and callers
/// sharing a context across threads must serialize access themselves.
///
/// Every failing operation overwrites the error channel, so the message is
/// available through [`Context::strerror`] as well as the returned error.
/// Successful operations leave the channel alone.
pub struct Context {
    // Declared first so the handle is released before the runtime it lives in.
    pipeline: Option<PipelineHandle>,
    runtime: Runtime,
    errors: ErrorChannel,
}

impl Context {
    /// Create a context with default configuration.
    pub fn new() -> RadioResult<Self> {
        Self::with_config(&ContextConfig::default())
    }

    pub fn with_config(config: &ContextConfig) -> RadioResult<Self> {
        let runtime = Runtime::new(config)?;
        tracing::debug!(library_path = ?config.library_path, "context created");
        Ok(Self {
            pipeline: None,
            runtime,
            errors: ErrorChannel::new(),
        })
    }

    /// Bind the library, run `source` and track the Pipeline it returns.
    ///
    /// Whatever was tracked before is dropped first, so a failed load leaves
    /// nothing tracked.
    pub fn load(&mut self, source: &str) -> RadioResult<()> {
        self.pipeline = None;
        let result = self.load_pipeline(source);
        match result {
            Ok(handle) => {
                self.pipeline = Some(handle);
                tracing::debug!("pipeline loaded");
                Ok(())
            }
            Err(e) => Err(self.capture(e)),
        }
    }

    fn load_pipeline(&self, source: &str) -> RadioResult<PipelineHandle> {
        self.runtime.bind_library().map_err(RadioError::Script)?;
        let chunk = self.runtime.compile(source).map_err(RadioError::Script)?;
        let mut values = self
            .runtime
            .protected_call(&chunk, Vec::new())
            .map_err(RadioError::Script)?;
        if values.len() != 1 {
            tracing::debug!(count = values.len(), "script must return exactly one value");
            return Err(RadioError::Validation);
        }
        let value: Value = values.remove(0);
        PipelineHandle::validate(&self.runtime, value)
    }

    pub fn start(&mut self) -> RadioResult<()> {
        self.invoke(Operation::Start)
    }

    /// Request cooperative cancellation; completion shows up through
    /// `status` or `wait`.
    pub fn stop(&mut self) -> RadioResult<()> {
        self.invoke(Operation::Stop)
    }

    /// Block until the library reports the pipeline finished.
    pub fn wait(&mut self) -> RadioResult<()> {
        self.invoke(Operation::Wait)
    }

    /// Whether the pipeline is still running.
    pub fn status(&mut self) -> RadioResult<bool> {
        let result = match &self.pipeline {
            Some(handle) => handle
                .status(&self.runtime)
                .map(|PipelineStatus { running }| running),
            None => Err(RadioError::NoPipeline(Operation::Status)),
        };
        result.map_err(|e| self.capture(e))
    }

    fn invoke(&mut self, operation: Operation) -> RadioResult<()> {
        let result = match &self.pipeline {
            Some(handle) => handle.invoke(&self.runtime, operation).map(|_| ()),
            None => Err(RadioError::NoPipeline(operation)),
        };
        result.map_err(|e| self.capture(e))
    }

    /// Invoke `status()` without reading the result.
    ///
    /// Fails like [`Context::status`] when nothing is loaded or the method
    /// raises. The returned value is not inspected.
    pub fn poll(&mut self) -> RadioResult<()> {
        self.invoke(Operation::Status)
    }

    fn capture(&mut self, err: RadioError) -> RadioError {
        let message = err.to_string();
        tracing::warn!(error = %message, "context operation failed");
        self.errors.set(&message);
        err
    }

    /// Record a failure raised outside the runtime (for example by a foreign
    /// caller passing an unusable argument).
    pub(crate) fn fail_load(&mut self, message: &str) {
        self.pipeline = None;
        tracing::warn!(error = %message, "context operation failed");
        self.errors.set(message);
    }

    /// Message of the most recent failure, empty if nothing has failed yet.
    pub fn strerror(&self) -> &str {
        self.errors.as_str()
    }

    pub fn error_c_str(&self) -> &CStr {
        self.errors.as_c_str()
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.pipeline.is_some() {
            tracing::debug!("context dropped with a pipeline still tracked");
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("has_pipeline", &self.has_pipeline())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_empty() {
        let ctx = Context::new().unwrap();
        assert!(!ctx.has_pipeline());
        assert_eq!(ctx.strerror(), "");
    }

    #[test]
    fn lifecycle_without_pipeline_names_the_operation() {
        let mut ctx = Context::new().unwrap();
        assert!(ctx.start().is_err());
        assert_eq!(ctx.strerror(), "no Pipeline loaded to start");
        assert!(ctx.stop().is_err());
        assert_eq!(ctx.strerror(), "no Pipeline loaded to stop");
        assert!(ctx.wait().is_err());
        assert_eq!(ctx.strerror(), "no Pipeline loaded to wait on");
        assert!(ctx.status().is_err());
        assert_eq!(ctx.strerror(), "no Pipeline loaded to query status");
        assert!(ctx.poll().is_err());
        assert_eq!(ctx.strerror(), "no Pipeline loaded to query status");
    }

    #[test]
    fn load_without_library_reports_module_error() {
        let mut ctx = Context::new().unwrap();
        let err = ctx.load("return 5").unwrap_err();
        assert!(matches!(err, RadioError::Script(_)));
        assert!(ctx.strerror().contains("module 'radio' not found"));
        assert!(!ctx.has_pipeline());
    }

    #[test]
    fn fail_load_clears_pipeline_and_sets_message() {
        let mut ctx = Context::new().unwrap();
        ctx.fail_load("script is null");
        assert_eq!(ctx.strerror(), "script is null");
        assert!(!ctx.has_pipeline());
    }
}
