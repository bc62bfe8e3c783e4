//! JSON line I/O for the CLI
//!
//! - Input: one JSON object on stdin
//! - Output: one JSON object on stdout, `{status, data}` or
//!   `{status: "error", code, message}`

use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::errors::{CliError, CliResult};

/// Read one JSON request from stdin
pub fn read_request<T: DeserializeOwned>() -> CliResult<T> {
    read_request_from(io::stdin().lock())
}

pub fn read_request_from<T: DeserializeOwned, R: BufRead>(mut reader: R) -> CliResult<T> {
    let mut line = String::new();
    reader.read_line(&mut line)?;

    if line.trim().is_empty() {
        return Err(CliError::Io("Empty input".into()));
    }

    Ok(serde_json::from_str(&line)?)
}

/// Write a success response to stdout
pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    write_response_to(&mut io::stdout().lock(), data)
}

pub fn write_response_to<T: Serialize, W: Write>(out: &mut W, data: &T) -> CliResult<()> {
    let response = json!({
        "status": "ok",
        "data": data,
    });
    write_line(out, &response)
}

/// Write an error response
pub fn write_error_to<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = json!({
        "status": "error",
        "code": code,
        "message": message,
    });
    write_line(out, &response)
}

fn write_line<W: Write>(out: &mut W, value: &serde_json::Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
