//! Request/response mapping between tape messages and the Messages API.

use quine_tape::{Message, Role, ToolCall};
use quine_turn::types::{Completion, ProviderRequest, TokenUsage};
use quine_turn::ProviderError;

/// Convert a [`ProviderRequest`] into the Messages API JSON body.
///
/// The system message is lifted out of the conversation into the
/// top-level `system` field. Runs of consecutive tool-result messages
/// collapse into one user message of `tool_result` blocks, preserving
/// the strict user/assistant alternation the dialect requires.
#[must_use]
pub(crate) fn to_api_request(req: &ProviderRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "messages": map_messages(&req.messages),
    });

    if let Some(system) = req.messages.iter().find(|m| m.role == Role::System) {
        body["system"] = serde_json::Value::String(system.content.clone());
    }

    if !req.tools.is_empty() {
        body["tools"] = serde_json::Value::Array(
            req.tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.input_schema,
                    })
                })
                .collect(),
        );
    }

    body
}

fn map_messages(messages: &[Message]) -> serde_json::Value {
    let mut out: Vec<serde_json::Value> = Vec::new();
    let mut pending_results: Vec<serde_json::Value> = Vec::new();

    for msg in messages {
        if msg.role == Role::Tool {
            pending_results.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
                "is_error": msg.is_error,
            }));
            continue;
        }
        flush_results(&mut out, &mut pending_results);

        match msg.role {
            Role::System => {} // lifted to the top-level field
            Role::User => out.push(serde_json::json!({
                "role": "user",
                "content": [{"type": "text", "text": msg.content}],
            })),
            Role::Assistant => {
                let mut blocks: Vec<serde_json::Value> = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(serde_json::json!({"type": "text", "text": msg.content}));
                }
                for call in &msg.tool_calls {
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.args,
                    }));
                }
                out.push(serde_json::json!({"role": "assistant", "content": blocks}));
            }
            Role::Tool => unreachable!("handled above"),
        }
    }
    flush_results(&mut out, &mut pending_results);

    serde_json::Value::Array(out)
}

fn flush_results(out: &mut Vec<serde_json::Value>, pending: &mut Vec<serde_json::Value>) {
    if !pending.is_empty() {
        out.push(serde_json::json!({
            "role": "user",
            "content": std::mem::take(pending),
        }));
    }
}

/// Parse a Messages API response into a [`Completion`].
pub(crate) fn from_api_response(json: &serde_json::Value) -> Result<Completion, ProviderError> {
    let content = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing content array".into()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ProviderError::InvalidResponse("tool_use without id".into()))?;
                let name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ProviderError::InvalidResponse("tool_use without name".into()))?;
                let args = match block.get("input") {
                    Some(serde_json::Value::Object(map)) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                tool_calls.push(ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    args,
                });
            }
            _ => {} // thinking and future block types are not surfaced
        }
    }

    let usage = TokenUsage {
        input_tokens: json["usage"]["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0),
    };

    Ok(Completion {
        message: Message::assistant(text, tool_calls),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quine_turn::types::ToolSchema;
    use serde_json::json;

    fn request(messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "claude-test".into(),
            messages,
            tools: vec![ToolSchema {
                name: "sh".into(),
                description: "shell".into(),
                input_schema: json!({"type": "object"}),
            }],
            max_tokens: 512,
        }
    }

    #[test]
    fn system_message_is_lifted() {
        let body = to_api_request(&request(vec![
            Message::system("be brief"),
            Message::user("Begin."),
        ]));
        assert_eq!(body["system"], "be brief");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn consecutive_tool_results_collapse_to_one_user_message() {
        let call_a = ToolCall { id: "a".into(), name: "sh".into(), args: Default::default() };
        let call_b = ToolCall { id: "b".into(), name: "sh".into(), args: Default::default() };
        let body = to_api_request(&request(vec![
            Message::user("Begin."),
            Message::assistant("", vec![call_a, call_b]),
            Message::tool_result("a", "out a", false),
            Message::tool_result("b", "out b", true),
        ]));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["type"], "tool_result");
        assert_eq!(results[0]["tool_use_id"], "a");
        assert_eq!(results[1]["is_error"], true);
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let call = ToolCall {
            id: "tc_1".into(),
            name: "sh".into(),
            args: json!({"command": "ls"}).as_object().unwrap().clone(),
        };
        let body = to_api_request(&request(vec![
            Message::user("go"),
            Message::assistant("running", vec![call]),
        ]));
        let blocks = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "tool_use");
        assert_eq!(blocks[1]["input"]["command"], "ls");
    }

    #[test]
    fn tools_are_published_with_schemas() {
        let body = to_api_request(&request(vec![Message::user("x")]));
        assert_eq!(body["tools"][0]["name"], "sh");
        assert!(body["tools"][0]["input_schema"].is_object());
    }

    #[test]
    fn response_parses_text_and_tool_use() {
        let completion = from_api_response(&json!({
            "content": [
                {"type": "text", "text": "I will run it."},
                {"type": "tool_use", "id": "toolu_1", "name": "sh",
                 "input": {"command": "echo hi"}},
            ],
            "usage": {"input_tokens": 120, "output_tokens": 34},
        }))
        .unwrap();
        assert_eq!(completion.message.content, "I will run it.");
        assert_eq!(completion.message.tool_calls.len(), 1);
        assert_eq!(completion.message.tool_calls[0].name, "sh");
        assert_eq!(
            completion.message.tool_calls[0].args["command"],
            json!("echo hi")
        );
        assert_eq!(completion.usage.input_tokens, 120);
        assert_eq!(completion.usage.output_tokens, 34);
    }

    #[test]
    fn response_without_content_is_invalid() {
        let err = from_api_response(&json!({"usage": {}})).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn tool_use_without_id_is_invalid() {
        let err = from_api_response(&json!({
            "content": [{"type": "tool_use", "name": "sh", "input": {}}],
        }))
        .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
