//! blackhole: answer every HTTP request with the same page
//!
//! Usage:
//!     blackhole <response-file>
//!
//! The file's bytes become the response body. Every `\r\n\r\n` a client
//! sends earns one copy of the response; connections stay open until the
//! client closes them.
//!
//! # Environment Variables
//!
//! - `BH_PORT`, `BH_BIND_ADDR`, `BH_BACKLOG` - listener (default `[::]:80`)
//! - `BH_STATUS_LINE`, `BH_CONTENT_TYPE` - response header
//! - `BH_LOG_LEVEL`, `BH_FLUSH_EPRINT`, `BH_LOG_FILE` - logging
//! - see `ServerConfig::from_env` for the rest
//!
//! ```text
//! BH_PORT=8080 BH_LOG_LEVEL=debug cargo run -p blackhole -- maintenance.html
//! ```

use blackhole_core::error::BhResult;
use blackhole_core::{kerror, kinfo, kprint, kprintln};
use blackhole_runtime::{signal, Response, Server, ServerConfig, ServerReport};
use std::path::PathBuf;
use std::process::ExitCode;

fn usage(program: &str) {
    kprintln!("usage: {} <response-file>", program);
}

fn serve(path: PathBuf) -> BhResult<ServerReport> {
    let config = ServerConfig::from_env();
    config.validate()?;
    if kprint::level_enabled(kprint::LogLevel::Debug) {
        config.print();
    }

    let response = Response::from_file(&path, &config.status_line, &config.content_type)?;
    kinfo!(
        "loaded {} ({} body bytes, {} on the wire)",
        path.display(),
        response.body_len(),
        response.len()
    );

    let server = Server::bind(config, response)?;
    signal::install_shutdown_handler(&server.shutdown_token())?;
    server.run()
}

fn main() -> ExitCode {
    kprint::init();
    kprint::set_thread_tag("main");

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "blackhole".to_string());
    let path = match (args.next(), args.next()) {
        (Some(arg), None) if arg == "-h" || arg == "--help" => {
            usage(&program);
            return ExitCode::SUCCESS;
        }
        (Some(path), None) => PathBuf::from(path),
        _ => {
            usage(&program);
            return ExitCode::FAILURE;
        }
    };

    match serve(path) {
        Ok(report) => {
            kinfo!(
                "served {} responses to {} connections",
                report.worker.responses,
                report.accepted
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            kerror!("{}", e);
            ExitCode::FAILURE
        }
    }
}
