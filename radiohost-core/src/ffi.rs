//! C ABI over [`Context`].
//!
//! # Symbol prefix
//!
//! - Functions: `radiohost_*`
//! - Types: `radiohost_*_t`
//!
//! Every function returns `0` on success and `-1` on failure; the message is
//! read with `radiohost_strerror`.
//!
//! # Thread safety
//!
//! **NOT thread-safe.** All calls on the same context must be serialized by
//! the caller.

use std::ffi::{c_char, c_int, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::config::ContextConfig;
use crate::context::Context;
use crate::version::{self, COMMIT_ID_C, MAJOR, MINOR, PATCH, VERSION_C};

const OK: c_int = 0;
const FAIL: c_int = -1;

const ALLOCATION_ERROR: &[u8] = b"allocation error\0";

/// Version descriptor as seen from C.
#[repr(C)]
#[derive(Debug)]
#[allow(non_camel_case_types)]
pub struct radiohost_version_t {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub commit_id: *const c_char,
}

// SAFETY: the only pointer refers to a static, immutable NUL-terminated string.
unsafe impl Sync for radiohost_version_t {}

static VERSION_INFO_C: radiohost_version_t = radiohost_version_t {
    major: MAJOR,
    minor: MINOR,
    patch: PATCH,
    commit_id: COMMIT_ID_C.as_ptr(),
};

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

/// Run `f`, turning a panic into `default`.
fn guard<T>(op: &'static str, default: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            tracing::error!(op, panic = %panic_message(payload), "panic at ffi boundary");
            default
        }
    }
}

/// Run `f` against the context behind `ctx`, failing on a null pointer.
///
/// # Safety
///
/// `ctx` must be null or a pointer returned by `radiohost_new` that has not
/// been freed.
unsafe fn with_context(
    op: &'static str,
    ctx: *mut Context,
    f: impl FnOnce(&mut Context) -> c_int,
) -> c_int {
    guard(op, FAIL, || match unsafe { ctx.as_mut() } {
        Some(ctx) => f(ctx),
        None => FAIL,
    })
}

fn code<T, E>(result: Result<T, E>) -> c_int {
    match result {
        Ok(_) => OK,
        Err(_) => FAIL,
    }
}

/// Create a context configured from `RADIOHOST_LIBRARY_PATH` and
/// `RADIOHOST_MEMORY_LIMIT`. Returns null on allocation failure.
#[no_mangle]
pub extern "C" fn radiohost_new() -> *mut Context {
    guard("radiohost_new", std::ptr::null_mut(), || {
        let config = ContextConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring environment configuration");
            ContextConfig::default()
        });
        new_context(&config)
    })
}

fn new_context(config: &ContextConfig) -> *mut Context {
    match Context::with_config(config) {
        Ok(ctx) => Box::into_raw(Box::new(ctx)),
        Err(e) => {
            tracing::warn!(error = %e, "context creation failed");
            std::ptr::null_mut()
        }
    }
}

/// Load a script.
///
/// # Safety
///
/// `ctx` must be null or a live context; `script` must be null or a valid
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn radiohost_load(ctx: *mut Context, script: *const c_char) -> c_int {
    with_context("radiohost_load", ctx, |ctx| {
        if script.is_null() {
            ctx.fail_load("script is null");
            return FAIL;
        }
        match unsafe { CStr::from_ptr(script) }.to_str() {
            Ok(source) => code(ctx.load(source)),
            Err(_) => {
                ctx.fail_load("script is not valid UTF-8");
                FAIL
            }
        }
    })
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn radiohost_start(ctx: *mut Context) -> c_int {
    with_context("radiohost_start", ctx, |ctx| code(ctx.start()))
}

/// Query whether the pipeline is running.
///
/// With a null `running` the `status` method is still invoked and its
/// outcome returned, but nothing is written.
///
/// # Safety
///
/// `ctx` must be null or a live context; `running` must be null or valid for
/// writes.
#[no_mangle]
pub unsafe extern "C" fn radiohost_status(ctx: *mut Context, running: *mut bool) -> c_int {
    with_context("radiohost_status", ctx, |ctx| {
        if running.is_null() {
            return code(ctx.poll());
        }
        match ctx.status() {
            Ok(flag) => {
                unsafe { running.write(flag) };
                OK
            }
            Err(_) => FAIL,
        }
    })
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn radiohost_wait(ctx: *mut Context) -> c_int {
    with_context("radiohost_wait", ctx, |ctx| code(ctx.wait()))
}

/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn radiohost_stop(ctx: *mut Context) -> c_int {
    with_context("radiohost_stop", ctx, |ctx| code(ctx.stop()))
}

/// Destroy a context. Null is ignored.
///
/// # Safety
///
/// `ctx` must be null or a live context; it must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn radiohost_free(ctx: *mut Context) {
    if ctx.is_null() {
        return;
    }
    guard("radiohost_free", (), || drop(unsafe { Box::from_raw(ctx) }));
}

/// Message of the last failure. Valid until the next call on `ctx`.
///
/// # Safety
///
/// `ctx` must be null or a live context.
#[no_mangle]
pub unsafe extern "C" fn radiohost_strerror(ctx: *const Context) -> *const c_char {
    match unsafe { ctx.as_ref() } {
        Some(ctx) => ctx.error_c_str().as_ptr(),
        None => ALLOCATION_ERROR.as_ptr().cast(),
    }
}

#[no_mangle]
pub extern "C" fn radiohost_version() -> *const c_char {
    VERSION_C.as_ptr()
}

#[no_mangle]
pub extern "C" fn radiohost_version_number() -> u32 {
    version::version_number()
}

#[no_mangle]
pub extern "C" fn radiohost_version_info() -> *const radiohost_version_t {
    &VERSION_INFO_C
}
