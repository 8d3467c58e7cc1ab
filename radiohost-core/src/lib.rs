//! radiohost core: embeds a Lua pipeline library, loads scripts that build
//! a Pipeline, and drives its lifecycle with bounded error reporting.

pub mod config;
pub mod context;
pub mod error;
pub mod error_channel;
pub mod ffi;
pub mod pipeline;
pub mod runtime;
pub mod version;

pub use config::ContextConfig;
pub use context::Context;
pub use error::{CapturedError, RadioError, RadioResult};
pub use error_channel::{ErrorChannel, ERROR_CAPACITY};
pub use pipeline::{Operation, PipelineHandle, PipelineStatus};
pub use runtime::{Runtime, LIBRARY_NAME};
pub use version::{version, version_info, version_number, VersionInfo};
