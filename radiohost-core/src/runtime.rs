//! The embedded Lua runtime: creation, library binding, compilation and
//! protected calls with traceback capture.

use mlua::{Function, Lua, MultiValue, Table, Value};

use crate::config::ContextConfig;
use crate::error::{CapturedError, RadioError, RadioResult};

/// Global name the pipeline library is bound under.
pub const LIBRARY_NAME: &str = "radio";

/// Chunk name reported in script error locations (`script:3: ...`).
const CHUNK_NAME: &str = "=script";

/// Looks the method up on the handle and calls it with the handle as `self`,
/// so the lookup itself also runs under the caller's protected call.
const INVOKE_METHOD: &str = r#"
return function(handle, name, ...)
    local method = handle[name]
    if method == nil then
        error(string.format("pipeline has no method '%s'", name), 2)
    end
    return method(handle, ...)
end
"#;

/// One Lua state with the handful of functions the host needs cached.
///
/// `xpcall` and `debug.traceback` are captured at creation so a script that
/// reassigns the globals cannot break error capture.
pub struct Runtime {
    xpcall: Function,
    traceback: Function,
    invoke_method: Function,
    lua: Lua,
}

impl Runtime {
    /// Create a Lua state with all standard libraries opened.
    pub fn new(config: &ContextConfig) -> RadioResult<Self> {
        // SAFETY: `debug` is required for tracebacks; nothing in the host
        // relies on the guarantees the safe constructor adds.
        let lua = std::panic::catch_unwind(|| unsafe { Lua::unsafe_new() })
            .map_err(|_| RadioError::Allocation)?;
        Self::prepare(lua, config).map_err(|e| RadioError::Setup(e.to_string()))
    }

    fn prepare(lua: Lua, config: &ContextConfig) -> mlua::Result<Self> {
        let globals = lua.globals();

        let prefix = config.package_path_prefix();
        if !prefix.is_empty() {
            let package: Table = globals.get("package")?;
            let current: String = package.get("path")?;
            package.set("path", format!("{prefix}{current}"))?;
        }

        if let Some(limit) = config.memory_limit {
            lua.set_memory_limit(limit)?;
        }

        let xpcall: Function = globals.get("xpcall")?;
        let debug: Table = globals.get("debug")?;
        let traceback: Function = debug.get("traceback")?;
        let invoke_method: Function = lua.load(INVOKE_METHOD).set_name("=invoke").eval()?;

        Ok(Self {
            xpcall,
            traceback,
            invoke_method,
            lua,
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Call `func` under `xpcall` with `debug.traceback` as message handler.
    ///
    /// Returns every value the function produced; a raised error comes back
    /// as a [`CapturedError`] and never unwinds into the host.
    pub fn protected_call(
        &self,
        func: &Function,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, CapturedError> {
        let mut call_args = vec![
            Value::Function(func.clone()),
            Value::Function(self.traceback.clone()),
        ];
        call_args.extend(args);

        let results: MultiValue = self.xpcall.call(MultiValue::from_vec(call_args))?;
        let mut results = results.into_iter();
        match results.next() {
            Some(Value::Boolean(true)) => Ok(results.collect()),
            Some(_) => Err(CapturedError::from_value(&results.next().unwrap_or(Value::Nil))),
            None => Err(CapturedError::Text("xpcall returned no status".to_string())),
        }
    }

    /// `radio = require("radio")`, under a protected call.
    pub fn bind_library(&self) -> Result<(), CapturedError> {
        let globals = self.lua.globals();
        let require: Function = globals.get("require")?;
        let name = self.lua.create_string(LIBRARY_NAME)?;
        let module = self
            .protected_call(&require, vec![Value::String(name)])?
            .into_iter()
            .next()
            .unwrap_or(Value::Nil);
        globals.set(LIBRARY_NAME, module)?;
        Ok(())
    }

    /// Compile script text without running it.
    pub fn compile(&self, source: &str) -> Result<Function, CapturedError> {
        Ok(self.lua.load(source).set_name(CHUNK_NAME).into_function()?)
    }

    /// Call `handle:<name>()` under a protected call.
    pub fn call_method(&self, handle: &Value, name: &str) -> Result<Vec<Value>, CapturedError> {
        let name = self.lua.create_string(name)?;
        self.protected_call(&self.invoke_method, vec![handle.clone(), Value::String(name)])
    }

    /// The bound library table, if `bind_library` has run and produced one.
    pub fn library(&self) -> Result<Table, CapturedError> {
        Ok(self.lua.globals().get(LIBRARY_NAME)?)
    }
}
