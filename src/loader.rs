//! The WebAssembly loader
//!
//! A [`WasmLoader`] owns at most one live module instance. It fetches the
//! module, links it against the no-op WASI shim, keeps a handle to the
//! exported `memory`, and moves strings across the host/guest boundary.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded --load--> Loading --ok--> Ready
//!                       |
//!                       +--err--> Failed
//! ```
//!
//! `dispose` returns to `Unloaded` from any state. Calling `load` again
//! replaces whatever was loaded before.
//!
//! # Example
//!
//! ```no_run
//! use wasm_loader::{LoaderConfig, WasmLoader};
//!
//! let mut loader = WasmLoader::new(LoaderConfig::default());
//! loader.load("static/wasm/lisp.wasm")?;
//! let ptr = loader.write_string("(+ 1 2)")?;
//! let text = loader.read_string(ptr)?;
//! assert_eq!(text, "(+ 1 2)");
//! # Ok::<(), wasm_loader::LoaderError>(())
//! ```

use crate::config::{LoaderConfig, ResultMode};
use crate::error::{LoaderError, Result};
use crate::events::{EventBus, LoaderEvent, LoaderObserver, SubscriptionId};
use crate::fetch;
use crate::memory;
use crate::wasi::{self, HostState, MEMORY_EXPORT};
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

pub struct WasmLoader {
    config: LoaderConfig,
    engine: Engine,
    store: Store<HostState>,
    instance: Option<Instance>,
    memory: Option<Memory>,
    state: LoadState,
    url: Option<String>,
    events: EventBus,
}

impl WasmLoader {
    pub fn new(config: LoaderConfig) -> Self {
        let engine = Engine::default();
        let store = Store::new(&engine, HostState::default());
        Self {
            config,
            engine,
            store,
            instance: None,
            memory: None,
            state: LoadState::Unloaded,
            url: None,
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// True once a load has succeeded and until the next load or dispose.
    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    /// URL of the most recent load attempt.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn instance(&self) -> Option<Instance> {
        self.instance
    }

    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }

    pub fn subscribe(&mut self, observer: impl LoaderObserver + 'static) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Fetch, compile and instantiate the module at `url`.
    ///
    /// Exactly one event is dispatched per call: `wasm-ready` on success,
    /// `wasm-error` on failure. The error is also returned to the caller.
    pub fn load(&mut self, url: &str) -> Result<Instance> {
        self.begin(url);
        let result = fetch::fetch(url, self.config.max_fetch_bytes).and_then(|bytes| self.instantiate(&bytes));
        self.finish(url, result)
    }

    /// Like [`load`](Self::load) for bytes already in memory. `name` stands in
    /// for the URL in events and logs. WAT text is accepted as well as binary.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<Instance> {
        self.begin(name);
        let result = self.instantiate(bytes);
        self.finish(name, result)
    }

    fn begin(&mut self, url: &str) {
        if self.state != LoadState::Unloaded {
            tracing::warn!(target: "loader", url, previous = ?self.url, state = ?self.state, "reloading; previous instance is dropped");
        }
        self.reset_instance();
        self.state = LoadState::Loading;
        self.url = Some(url.to_string());
        tracing::debug!(target: "loader", url, "loading");
    }

    fn instantiate(&mut self, bytes: &[u8]) -> Result<Instance> {
        let module = Module::new(&self.engine, bytes).map_err(|e| LoaderError::Compile(format!("{e:#}")))?;

        let mut linker = Linker::new(&self.engine);
        wasi::add_to_linker(&mut linker)?;

        let instance = linker
            .instantiate(&mut self.store, &module)
            .map_err(|e| LoaderError::Instantiate(format!("{e:#}")))?;
        let memory = instance
            .get_memory(&mut self.store, MEMORY_EXPORT)
            .ok_or_else(|| LoaderError::MissingExport(MEMORY_EXPORT.to_string()))?;

        self.instance = Some(instance);
        self.memory = Some(memory);
        Ok(instance)
    }

    fn finish(&mut self, url: &str, result: Result<Instance>) -> Result<Instance> {
        match result {
            Ok(instance) => {
                self.state = LoadState::Ready;
                let event = LoaderEvent::Ready {
                    url: url.to_string(),
                    exports: self.exports(),
                    memory_bytes: self.memory_size(),
                };
                tracing::debug!(target: "loader", url, memory_bytes = self.memory_size(), "instantiated");
                self.events.dispatch(&event);
                Ok(instance)
            }
            Err(err) => {
                self.reset_instance();
                self.state = LoadState::Failed;
                let event = LoaderEvent::Error {
                    url: url.to_string(),
                    message: err.to_string(),
                };
                self.events.dispatch(&event);
                Err(err)
            }
        }
    }

    /// Drop instance, memory and store; the loader becomes `Unloaded`.
    pub fn dispose(&mut self) {
        self.reset_instance();
        self.state = LoadState::Unloaded;
        self.url = None;
    }

    fn reset_instance(&mut self) {
        self.instance = None;
        self.memory = None;
        self.store = Store::new(&self.engine, HostState::default());
    }

    /// Names of the instance's exports, empty when nothing is loaded.
    pub fn exports(&mut self) -> Vec<String> {
        match self.instance {
            Some(instance) => instance
                .exports(&mut self.store)
                .map(|export| export.name().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Current size of linear memory in bytes, zero when nothing is loaded.
    pub fn memory_size(&self) -> usize {
        self.memory.map(|m| m.data_size(&self.store)).unwrap_or(0)
    }

    /// Number of WASI shim calls made by the current instance.
    pub fn shim_calls(&self) -> u64 {
        self.store.data().shim_calls
    }

    /// Code from the guest's last `proc_exit`, if it called one.
    pub fn exit_code(&self) -> Option<i32> {
        self.store.data().exit_code
    }

    fn ready_memory(&self) -> Result<Memory> {
        match (self.state, self.memory) {
            (LoadState::Ready, Some(memory)) => Ok(memory),
            _ => Err(LoaderError::NotReady),
        }
    }

    /// Borrow linear memory.
    pub fn data(&self) -> Result<&[u8]> {
        let memory = self.ready_memory()?;
        Ok(memory.data(&self.store))
    }

    /// Borrow linear memory mutably.
    pub fn data_mut(&mut self) -> Result<&mut [u8]> {
        let memory = self.ready_memory()?;
        Ok(memory.data_mut(&mut self.store))
    }

    /// Write `s` plus a zero byte at the configured default offset.
    pub fn write_string(&mut self, s: &str) -> Result<u32> {
        let offset = self.config.string_offset;
        self.write_string_at(s, offset)
    }

    /// Write `s` plus a zero byte at `offset` and return `offset`.
    pub fn write_string_at(&mut self, s: &str, offset: u32) -> Result<u32> {
        let ptr = memory::write_string(self.data_mut()?, s, offset)?;
        tracing::trace!(target: "loader", offset, len = s.len(), "wrote string");
        Ok(ptr)
    }

    /// Read the zero-terminated string at `ptr`.
    pub fn read_string(&self, ptr: u32) -> Result<String> {
        memory::read_string(self.data()?, ptr)
    }

    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<Vec<u8>> {
        memory::read_bytes(self.data()?, addr, len)
    }

    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        memory::write_bytes(self.data_mut()?, addr, bytes)
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32> {
        memory::read_u32(self.data()?, addr)
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        memory::write_u32(self.data_mut()?, addr, value)
    }

    /// Hex dump of `len` bytes at `addr`.
    pub fn dump(&self, addr: u32, len: usize) -> Result<String> {
        memory::hex_dump(self.data()?, addr, len)
    }

    /// Call an `(i32) -> i32` export.
    pub fn call_i32(&mut self, export: &str, arg: i32) -> Result<i32> {
        let instance = match (self.state, self.instance) {
            (LoadState::Ready, Some(instance)) => instance,
            _ => return Err(LoaderError::NotReady),
        };
        let call_error = |e: wasmtime::Error| LoaderError::Call {
            export: export.to_string(),
            message: format!("{e:#}"),
        };
        let func = instance
            .get_func(&mut self.store, export)
            .ok_or_else(|| LoaderError::MissingExport(export.to_string()))?
            .typed::<i32, i32>(&self.store)
            .map_err(call_error)?;
        func.call(&mut self.store, arg).map_err(call_error)
    }

    /// Write `input`, pass its pointer to the eval export, and turn the
    /// result into text according to the configured [`ResultMode`].
    pub fn call_eval(&mut self, input: &str) -> Result<String> {
        let ptr = self.write_string(input)?;
        let export = self.config.eval_export.clone();
        let result = self.call_i32(&export, ptr as i32)?;
        tracing::debug!(target: "loader", export = %export, ptr, result, "eval");
        match self.config.result_mode {
            ResultMode::Pointer => self.read_string(result as u32),
            ResultMode::Value => Ok(result.to_string()),
        }
    }
}

impl std::fmt::Debug for WasmLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmLoader")
            .field("state", &self.state)
            .field("url", &self.url)
            .field("memory_bytes", &self.memory_size())
            .field("events", &self.events)
            .finish()
    }
}

/// Load the configured module, if any, logging the outcome.
///
/// Mirrors the page's startup script: no URL means nothing happens, and a
/// failed load is logged (and announced to observers by `load`) but never
/// propagated. Returns whether a module is now ready.
pub fn autoload(loader: &mut WasmLoader) -> bool {
    let Some(url) = loader.config().wasm_url.clone() else {
        tracing::debug!(target: "loader", "no module configured; skipping autoload");
        return false;
    };
    match loader.load(&url) {
        Ok(_) => {
            tracing::info!(target: "loader", url = %url, "WASM loaded");
            true
        }
        Err(err) => {
            tracing::error!(target: "loader", url = %url, error = %err, "WASM load error");
            false
        }
    }
}
