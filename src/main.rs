//! wasm-loader CLI
//!
//! Usage: wasm-loader [--config FILE] [--log-level LEVEL] [--log-format text|json] [--events] [URL]
//!
//! Loads the module named by URL (or `WASM_URL`, or the config file), then
//! reads REPL input from stdin.

use std::env;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use wasm_loader::logging::{self, LogFormat, LogLevel, LogOptions};
use wasm_loader::{autoload, repl, LoaderConfig, LoaderEvent, ResultMode, WasmLoader};

const USAGE: &str = "usage: wasm-loader [--config FILE] [--log-level LEVEL] [--log-format text|json] \
[--result-mode pointer|value] [--events] [URL]";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    log_level: Option<LogLevel>,
    log_format: Option<LogFormat>,
    result_mode: Option<ResultMode>,
    events: bool,
    url: Option<String>,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    while let Some(arg) = argv.next() {
        let mut value = |name: &str| argv.next().ok_or_else(|| format!("{name} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--log-level" => {
                let v = value("--log-level")?;
                args.log_level = Some(LogLevel::parse(&v).ok_or_else(|| format!("unknown log level: {v}"))?);
            }
            "--log-format" => {
                let v = value("--log-format")?;
                args.log_format = Some(LogFormat::parse(&v).ok_or_else(|| format!("unknown log format: {v}"))?);
            }
            "--result-mode" => {
                let v = value("--result-mode")?;
                args.result_mode = Some(ResultMode::parse(&v).ok_or_else(|| format!("unknown result mode: {v}"))?);
            }
            "--events" => args.events = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            url => {
                if args.url.replace(url.to_string()).is_some() {
                    return Err("only one URL may be given".to_string());
                }
            }
        }
    }
    Ok(args)
}

fn main() {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            process::exit(2);
        }
    };

    let mut log_options = LogOptions::from_env();
    if let Some(level) = args.log_level {
        log_options.level = level;
    }
    if let Some(format) = args.log_format {
        log_options.format = format;
    }
    logging::init(log_options);

    let mut config = LoaderConfig::from_env();
    if let Some(path) = &args.config {
        match LoaderConfig::from_file(path) {
            Ok(file) => config = config.merged_with(file),
            Err(err) => {
                eprintln!("{err}");
                process::exit(2);
            }
        }
    }
    if args.url.is_some() {
        config.wasm_url = args.url.clone();
    }
    if let Some(mode) = args.result_mode {
        config.result_mode = mode;
    }

    let mut loader = WasmLoader::new(config);
    if args.events {
        loader.subscribe(|event: &LoaderEvent| println!("{}", event.to_json()));
    }
    autoload(&mut loader);

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    if let Err(err) = repl::run(&mut loader, stdin.lock(), io::stdout().lock(), interactive) {
        tracing::error!(target: "repl", error = %err, "i/o error");
        process::exit(1);
    }
    loader.dispose();
}
