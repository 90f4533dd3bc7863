//! PreToolUse hook envelope
//! Request: `{"tool_input": {"command": "..."}}` on stdin.
//! Response: `hookSpecificOutput` JSON on stdout, or nothing when undecided.

use bashguard_core::{Decision, Verdict};
use serde::{Deserialize, Serialize};

const HOOK_EVENT_NAME: &str = "PreToolUse";

#[derive(Debug, Deserialize)]
struct HookRequest {
    #[serde(default)]
    tool_input: Option<ToolInput>,
}

/// `tool_input` arrives either as an object or as a string that usually
/// holds the same object serialized a second time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ToolInput {
    Object(CommandInput),
    Encoded(String),
}

#[derive(Debug, Default, Deserialize)]
struct CommandInput {
    #[serde(default)]
    command: Option<String>,
}

#[derive(Debug, Serialize)]
struct HookResponse<'a> {
    #[serde(rename = "hookSpecificOutput")]
    hook_specific_output: HookSpecificOutput<'a>,
}

#[derive(Debug, Serialize)]
struct HookSpecificOutput<'a> {
    #[serde(rename = "hookEventName")]
    hook_event_name: &'static str,
    #[serde(rename = "permissionDecision")]
    permission_decision: &'static str,
    #[serde(rename = "permissionDecisionReason")]
    permission_decision_reason: &'a str,
}

/// Extract the command line from a raw request.
///
/// Anything unreadable is the empty command.
pub fn command_from_envelope(raw: &str) -> String {
    let request: HookRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable hook request, treating as empty command");
            return String::new();
        }
    };

    match request.tool_input {
        Some(ToolInput::Object(input)) => input.command.unwrap_or_default(),
        Some(ToolInput::Encoded(text)) => match serde_json::from_str::<CommandInput>(&text) {
            Ok(input) => input.command.unwrap_or_default(),
            Err(_) => text,
        },
        None => String::new(),
    }
}

/// Response for a verdict; `None` when undecided so the host falls back to
/// its own policy.
fn response_for(verdict: &Verdict) -> Option<HookResponse<'_>> {
    let permission_decision = match verdict.decision {
        Decision::Deny => "deny",
        Decision::Allow => "allow",
        Decision::Undecided => return None,
    };
    Some(HookResponse {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: HOOK_EVENT_NAME,
            permission_decision,
            permission_decision_reason: verdict.reason.as_deref().unwrap_or_default(),
        },
    })
}

/// Serialized response line, or `None` when nothing should be printed
pub fn render_decision(verdict: &Verdict) -> Option<String> {
    let response = response_for(verdict)?;
    to_line(&response)
}

fn to_line<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize hook response");
            None
        }
    }
}
