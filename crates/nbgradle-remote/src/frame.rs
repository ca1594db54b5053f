//! Stdout framing of the response.
//!
//! The build tool prints plenty of its own output, so the encoded response
//! is written between two marker lines as a single base64 line:
//!
//! ```text
//! NBGRADLE_MODELS_BEGIN
//! <base64 of the encoded Response>
//! NBGRADLE_MODELS_END
//! ```

use crate::response::Response;
use crate::RemoteError;
use base64::{engine::general_purpose, Engine as _};
use std::io::Write;

pub const RESPONSE_FRAME_BEGIN: &str = "NBGRADLE_MODELS_BEGIN";
pub const RESPONSE_FRAME_END: &str = "NBGRADLE_MODELS_END";

pub fn write_response_frame(out: &mut impl Write, response: &Response) -> Result<(), RemoteError> {
    let encoded = general_purpose::STANDARD.encode(response.encode()?);
    writeln!(out, "{RESPONSE_FRAME_BEGIN}")?;
    writeln!(out, "{encoded}")?;
    writeln!(out, "{RESPONSE_FRAME_END}")?;
    out.flush()?;
    Ok(())
}

/// Finds the first complete frame in `output` and decodes the response it
/// carries. Lines outside the frame are ignored.
pub fn extract_response_frame(output: &str) -> Result<Response, RemoteError> {
    let payload = frame_payload(output).ok_or(RemoteError::MissingFrame)?;
    let bytes = general_purpose::STANDARD.decode(payload)?;
    Ok(Response::decode(&bytes)?)
}

fn frame_payload(output: &str) -> Option<String> {
    let mut in_frame = false;
    let mut payload = String::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if !in_frame {
            if trimmed == RESPONSE_FRAME_BEGIN {
                in_frame = true;
            }
            continue;
        }
        if trimmed == RESPONSE_FRAME_END {
            return Some(payload);
        }
        payload.push_str(trimmed);
    }
    None
}
