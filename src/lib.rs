//! A host-side WebAssembly loader with a no-op WASI shim.
//!
//! wasm-loader fetches a single WebAssembly module, links it against stub
//! WASI preview1 imports, and exposes helpers for moving zero-terminated
//! UTF-8 strings in and out of the guest's linear memory. A small REPL drives
//! guests that export an `eval(ptr) -> i32` function.
//!
//! # Modules
//!
//! - [`loader`] -- [`WasmLoader`]: load lifecycle, string marshaling, guest calls.
//! - [`memory`] -- Bounds-checked helpers over a linear-memory byte slice.
//! - [`wasi`] -- The no-op `wasi_snapshot_preview1` shim.
//! - [`fetch`] -- Turns `http(s)://`, `file://`, `data:` URLs and paths into bytes.
//! - [`events`] -- `wasm-ready` / `wasm-error` notifications and observers.
//! - [`config`] -- Configuration from environment and JSON.
//! - [`repl`] -- The evaluate action and an interactive line loop.
//! - [`logging`] -- Log options and subscriber setup for the binary.
//!
//! # Example
//!
//! Load a module, write a string into its memory and read it back:
//!
//! ```
//! use wasm_loader::{LoaderConfig, WasmLoader};
//!
//! let mut loader = WasmLoader::new(LoaderConfig::default());
//! loader.load_bytes("inline", br#"(module (memory (export "memory") 1))"#).unwrap();
//!
//! let ptr = loader.write_string("hello").unwrap();
//! assert_eq!(ptr, 1024);
//! assert_eq!(loader.read_string(ptr).unwrap(), "hello");
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod memory;
pub mod repl;
pub mod wasi;

pub use config::{LoaderConfig, ResultMode};
pub use error::{LoaderError, Result};
pub use events::{LoaderEvent, LoaderObserver, SubscriptionId};
pub use loader::{autoload, LoadState, WasmLoader};
