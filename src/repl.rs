//! REPL front end for guests exporting `eval`
//!
//! [`evaluate`] is the "evaluate" action: it never fails, it always produces
//! the text to show the user. [`run`] wraps it in a line loop with a few
//! meta commands for poking at guest memory.

use crate::loader::WasmLoader;
use std::io::{self, BufRead, Write};

/// Shown when evaluation is attempted before a module is ready.
pub const NOT_LOADED: &str = "WASM not loaded yet...";

const PROMPT: &str = "> ";

/// Evaluate `input` in the guest and return the text to display.
pub fn evaluate(loader: &mut WasmLoader, input: &str) -> String {
    if !loader.is_ready() {
        return NOT_LOADED.to_string();
    }
    match loader.call_eval(input) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(target: "repl", error = %err, "evaluation failed");
            format!("Error: {err}")
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    State,
    Exports,
    Dump { addr: u32, len: usize },
    Eval(&'a str),
    Usage(&'static str),
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    let Some(meta) = trimmed.strip_prefix(':') else {
        return Command::Eval(line);
    };
    let mut parts = meta.split_whitespace();
    match parts.next() {
        Some("quit") | Some("q") => Command::Quit,
        Some("state") => Command::State,
        Some("exports") => Command::Exports,
        Some("dump") => {
            let addr = parts.next().and_then(parse_number);
            let len = parts.next().and_then(parse_number);
            match (addr, len) {
                (Some(addr), Some(len)) => Command::Dump { addr, len: len as usize },
                _ => Command::Usage("usage: :dump <addr> <len>"),
            }
        }
        _ => Command::Usage("commands: :state :exports :dump <addr> <len> :quit"),
    }
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_number(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn describe_state(loader: &WasmLoader) -> String {
    format!(
        "state={:?} url={} memory_bytes={} shim_calls={} exit_code={}",
        loader.state(),
        loader.url().unwrap_or("<none>"),
        loader.memory_size(),
        loader.shim_calls(),
        loader.exit_code().map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
    )
}

/// Read lines from `input` until EOF or `:quit`, writing one result per line to `output`.
///
/// The prompt is written only when `interactive` is set.
pub fn run(loader: &mut WasmLoader, input: impl BufRead, mut output: impl Write, interactive: bool) -> io::Result<()> {
    if interactive {
        write!(output, "{PROMPT}")?;
        output.flush()?;
    }
    for line in input.lines() {
        let line = line?;
        let reply = match parse_command(&line) {
            Command::Quit => break,
            Command::State => describe_state(loader),
            Command::Exports => loader.exports().join(" "),
            Command::Dump { addr, len } => match loader.dump(addr, len) {
                Ok(dump) => dump.trim_end().to_string(),
                Err(err) => format!("Error: {err}"),
            },
            Command::Eval(text) if text.trim().is_empty() => String::new(),
            Command::Eval(text) => evaluate(loader, text),
            Command::Usage(usage) => usage.to_string(),
        };
        if !reply.is_empty() {
            writeln!(output, "{reply}")?;
        }
        if interactive {
            write!(output, "{PROMPT}")?;
            output.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use rstest::rstest;

    #[rstest]
    #[case(":quit", Command::Quit)]
    #[case("  :q ", Command::Quit)]
    #[case(":state", Command::State)]
    #[case(":exports", Command::Exports)]
    #[case(":dump 1024 16", Command::Dump { addr: 1024, len: 16 })]
    #[case(":dump 0x400 0x10", Command::Dump { addr: 1024, len: 16 })]
    #[case(":dump 1024", Command::Usage("usage: :dump <addr> <len>"))]
    #[case("(car '(1 2))", Command::Eval("(car '(1 2))"))]
    fn parses_commands(#[case] line: &str, #[case] expected: Command<'static>) {
        assert_eq!(parse_command(line), expected);
    }

    #[test]
    fn evaluate_before_load() {
        let mut loader = WasmLoader::new(LoaderConfig::default());
        assert_eq!(evaluate(&mut loader, "(+ 1 2)"), NOT_LOADED);
    }

    #[test]
    fn run_stops_at_quit() {
        let mut loader = WasmLoader::new(LoaderConfig::default());
        let input = io::Cursor::new("(+ 1 2)\n:quit\n(never)\n");
        let mut out = Vec::new();
        run(&mut loader, input, &mut out, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{NOT_LOADED}\n"));
    }
}
