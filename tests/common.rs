//! Common test utilities shared between integration tests

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use wasm_loader::{LoaderEvent, WasmLoader};

/// Helper to compile WAT to WASM
pub fn wat_to_wasm(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).expect("Failed to parse WAT")
}

/// Guest whose eval returns its argument, so the result reads back as the input.
pub const ECHO_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "eval") (param i32) (result i32)
    (local.get 0)))
"#;

/// Guest whose eval returns the byte length of the string at its argument.
pub const STRLEN_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "eval") (param $p i32) (result i32)
    (local $n i32)
    (block $done
      (loop $scan
        (br_if $done (i32.eqz (i32.load8_u (i32.add (local.get $p) (local.get $n)))))
        (local.set $n (i32.add (local.get $n) (i32.const 1)))
        (br $scan)))
    (local.get $n)))
"#;

/// Guest whose eval always answers with a fixed string stored in a data segment.
pub const CONST_ANSWER_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (data (i32.const 16) "42\00")
  (func (export "eval") (param i32) (result i32)
    (i32.const 16)))
"#;

/// Guest whose eval traps.
pub const TRAPPING_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "eval") (param i32) (result i32)
    unreachable))
"#;

/// Records every event delivered to it.
#[derive(Clone, Default)]
pub struct EventLog(pub Arc<Mutex<Vec<LoaderEvent>>>);

impl EventLog {
    pub fn attach(loader: &mut WasmLoader) -> Self {
        let log = EventLog::default();
        let sink = log.0.clone();
        loader.subscribe(move |event: &LoaderEvent| sink.lock().unwrap().push(event.clone()));
        log
    }

    pub fn events(&self) -> Vec<LoaderEvent> {
        self.0.lock().unwrap().clone()
    }
}

/// Serve a single HTTP response on a local port and return the base URL.
pub fn serve_once(status_line: &'static str, body: Vec<u8>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/wasm\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
    });
    (format!("http://{addr}"), handle)
}
