pub mod check_price;
pub mod config;
pub mod doctor;

use serde::Serialize;

/// What a command prints and the process exit code it maps to.
///
/// Exit codes: `0` success, `1` the checked input was rejected, `2` bad invocation.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandPayload<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<&'a str>,
    message: String,
}

impl CommandResult {
    /// Free-form report output (config listing, doctor report).
    pub fn report(output: String) -> Self {
        Self { exit_code: 0, output }
    }

    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload =
            CommandPayload { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandPayload {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

fn serialize_payload(payload: &CommandPayload<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\
             \"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json(payload.command),
            escape_json(&error.to_string())
        )
    })
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
