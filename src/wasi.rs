//! No-op WASI preview1 shim
//!
//! Binaries built with wasi-sdk import a handful of `wasi_snapshot_preview1`
//! functions even when they never touch files, arguments or clocks. This
//! module satisfies those imports with stubs that do nothing and report
//! success, so such binaries link and run inside the loader.
//!
//! Guests relying on real behaviour silently see empty results: no
//! arguments, no environment, nothing read, writes discarded, a zero clock.
//! `proc_exit` records the code in [`HostState`] and returns normally; it
//! never terminates the host process.
//!
//! # Specification
//!
//! Signatures follow the WASI preview1 specification:
//! <https://github.com/WebAssembly/WASI/blob/wasi-0.1/preview1/docs.md>

use crate::error::{LoaderError, Result};
use wasmtime::{Caller, Linker};

/// Import module name used by WASI preview1 binaries.
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// Standard export name for WebAssembly linear memory.
pub const MEMORY_EXPORT: &str = "memory";

/// Every function the shim provides, in registration order.
pub const SHIM_FUNCTIONS: [&str; 11] = [
    "args_get",
    "args_sizes_get",
    "proc_exit",
    "fd_write",
    "fd_read",
    "fd_close",
    "fd_seek",
    "fd_fdstat_get",
    "environ_sizes_get",
    "environ_get",
    "clock_time_get",
];

/// WASI errno returned by every stub.
///
/// See: <https://github.com/WebAssembly/WASI/blob/wasi-0.1/preview1/docs.md#errno>
pub const ERRNO_SUCCESS: i32 = 0;

/// Per-store host data touched by the shim.
#[derive(Debug, Default, Clone)]
pub struct HostState {
    /// Number of shim functions invoked by the guest.
    pub shim_calls: u64,
    /// Code passed to the most recent `proc_exit`, if any.
    pub exit_code: Option<i32>,
}

/// Count and trace one stub invocation.
fn record(caller: &mut Caller<'_, HostState>, name: &'static str) {
    caller.data_mut().shim_calls += 1;
    tracing::trace!(target: "wasi", call = name, "shim call");
}

fn link_error(name: &str, err: impl std::fmt::Display) -> LoaderError {
    LoaderError::Instantiate(format!("registering {WASI_MODULE}.{name}: {err}"))
}

/// Register every stub in `linker` under `wasi_snapshot_preview1`.
pub fn add_to_linker(linker: &mut Linker<HostState>) -> Result<()> {
    // args_get: (argv_ptr, argv_buf_ptr) -> errno
    linker
        .func_wrap(WASI_MODULE, "args_get", |mut caller: Caller<'_, HostState>, _argv: i32, _buf: i32| -> i32 {
            record(&mut caller, "args_get");
            ERRNO_SUCCESS
        })
        .map_err(|e| link_error("args_get", e))?;

    // args_sizes_get: (argc_ptr, argv_buf_size_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "args_sizes_get",
            |mut caller: Caller<'_, HostState>, _argc: i32, _size: i32| -> i32 {
                record(&mut caller, "args_sizes_get");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("args_sizes_get", e))?;

    // proc_exit: (code) -> !
    linker
        .func_wrap(WASI_MODULE, "proc_exit", |mut caller: Caller<'_, HostState>, code: i32| {
            record(&mut caller, "proc_exit");
            caller.data_mut().exit_code = Some(code);
            tracing::debug!(target: "wasi", code, "guest called proc_exit; ignoring");
        })
        .map_err(|e| link_error("proc_exit", e))?;

    // fd_write: (fd, iovs_ptr, iovs_len, nwritten_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "fd_write",
            |mut caller: Caller<'_, HostState>, _fd: i32, _iovs: i32, _iovs_len: i32, _nwritten: i32| -> i32 {
                record(&mut caller, "fd_write");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("fd_write", e))?;

    // fd_read: (fd, iovs_ptr, iovs_len, nread_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "fd_read",
            |mut caller: Caller<'_, HostState>, _fd: i32, _iovs: i32, _iovs_len: i32, _nread: i32| -> i32 {
                record(&mut caller, "fd_read");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("fd_read", e))?;

    // fd_close: (fd) -> errno
    linker
        .func_wrap(WASI_MODULE, "fd_close", |mut caller: Caller<'_, HostState>, _fd: i32| -> i32 {
            record(&mut caller, "fd_close");
            ERRNO_SUCCESS
        })
        .map_err(|e| link_error("fd_close", e))?;

    // fd_seek: (fd, offset, whence, newoffset_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "fd_seek",
            |mut caller: Caller<'_, HostState>, _fd: i32, _offset: i64, _whence: i32, _newoffset: i32| -> i32 {
                record(&mut caller, "fd_seek");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("fd_seek", e))?;

    // fd_fdstat_get: (fd, buf_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "fd_fdstat_get",
            |mut caller: Caller<'_, HostState>, _fd: i32, _buf: i32| -> i32 {
                record(&mut caller, "fd_fdstat_get");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("fd_fdstat_get", e))?;

    // environ_sizes_get: (environc_ptr, environ_buf_size_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "environ_sizes_get",
            |mut caller: Caller<'_, HostState>, _count: i32, _size: i32| -> i32 {
                record(&mut caller, "environ_sizes_get");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("environ_sizes_get", e))?;

    // environ_get: (environ_ptr, environ_buf_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "environ_get",
            |mut caller: Caller<'_, HostState>, _environ: i32, _buf: i32| -> i32 {
                record(&mut caller, "environ_get");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("environ_get", e))?;

    // clock_time_get: (clock_id, precision, time_ptr) -> errno
    linker
        .func_wrap(
            WASI_MODULE,
            "clock_time_get",
            |mut caller: Caller<'_, HostState>, _clock: i32, _precision: i64, _time: i32| -> i32 {
                record(&mut caller, "clock_time_get");
                ERRNO_SUCCESS
            },
        )
        .map_err(|e| link_error("clock_time_get", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, Module, Store};

    fn linker(engine: &Engine) -> Linker<HostState> {
        let mut linker = Linker::new(engine);
        add_to_linker(&mut linker).unwrap();
        linker
    }

    #[test]
    fn registers_every_stub() {
        let engine = Engine::default();
        let linker = linker(&engine);
        let mut store = Store::new(&engine, HostState::default());
        for name in SHIM_FUNCTIONS {
            assert!(
                linker.get(&mut store, WASI_MODULE, name).is_some(),
                "missing {name}"
            );
        }
    }

    #[test]
    fn proc_exit_records_code_and_returns() {
        let engine = Engine::default();
        let linker = linker(&engine);
        let module = Module::new(
            &engine,
            r#"
            (module
              (import "wasi_snapshot_preview1" "proc_exit" (func $exit (param i32)))
              (func (export "run") (result i32)
                (call $exit (i32.const 7))
                (i32.const 99)))
            "#,
        )
        .unwrap();
        let mut store = Store::new(&engine, HostState::default());
        let instance = linker.instantiate(&mut store, &module).unwrap();
        let run = instance.get_typed_func::<(), i32>(&mut store, "run").unwrap();

        assert_eq!(run.call(&mut store, ()).unwrap(), 99);
        assert_eq!(store.data().exit_code, Some(7));
        assert_eq!(store.data().shim_calls, 1);
    }

    #[test]
    fn unknown_wasi_import_fails_to_link() {
        let engine = Engine::default();
        let linker = linker(&engine);
        let module = Module::new(
            &engine,
            r#"
            (module
              (import "wasi_snapshot_preview1" "random_get" (func (param i32 i32) (result i32))))
            "#,
        )
        .unwrap();
        let mut store = Store::new(&engine, HostState::default());
        assert!(linker.instantiate(&mut store, &module).is_err());
    }
}
