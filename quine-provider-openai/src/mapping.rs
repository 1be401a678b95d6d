//! Request/response mapping between tape messages and chat completions.

use quine_tape::{Message, Role, ToolCall};
use quine_turn::ProviderError;
use quine_turn::types::{Completion, ProviderRequest, TokenUsage};

/// Convert a [`ProviderRequest`] into the Chat Completions JSON body.
///
/// Arguments on outgoing tool calls are JSON-encoded strings, the
/// dialect's quirk; tool results become separate `role: "tool"` messages
/// keyed by `tool_call_id`.
#[must_use]
pub(crate) fn to_api_request(req: &ProviderRequest) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = Vec::new();

    for msg in &req.messages {
        match msg.role {
            Role::System => messages.push(serde_json::json!({
                "role": "system",
                "content": msg.content,
            })),
            Role::User => messages.push(serde_json::json!({
                "role": "user",
                "content": msg.content,
            })),
            Role::Assistant => {
                let mut obj = serde_json::json!({ "role": "assistant" });
                obj["content"] = if msg.content.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::Value::String(msg.content.clone())
                };
                if !msg.tool_calls.is_empty() {
                    obj["tool_calls"] = serde_json::Value::Array(
                        msg.tool_calls.iter().map(map_tool_call).collect(),
                    );
                }
                messages.push(obj);
            }
            Role::Tool => messages.push(serde_json::json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
            })),
        }
    }

    let mut body = serde_json::json!({
        "model": req.model,
        "messages": messages,
        "max_completion_tokens": req.max_tokens,
    });

    if !req.tools.is_empty() {
        body["tools"] = serde_json::Value::Array(
            req.tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        },
                    })
                })
                .collect(),
        );
    }

    body
}

fn map_tool_call(call: &ToolCall) -> serde_json::Value {
    serde_json::json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": serde_json::Value::Object(call.args.clone()).to_string(),
        },
    })
}

/// Parse a Chat Completions response into a [`Completion`].
pub(crate) fn from_api_response(json: &serde_json::Value) -> Result<Completion, ProviderError> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message".into()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProviderError::InvalidResponse("tool call without id".into()))?;
            let name = call
                .pointer("/function/name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProviderError::InvalidResponse("tool call without name".into()))?;
            let raw_args = call
                .pointer("/function/arguments")
                .and_then(|v| v.as_str())
                .unwrap_or("{}");
            let args = match serde_json::from_str::<serde_json::Value>(raw_args) {
                Ok(serde_json::Value::Object(map)) => map,
                // A model emitting unparseable arguments still gets its
                // call dispatched; the executor rejects with a readable
                // tool-result instead of the loop erroring out.
                _ => serde_json::Map::new(),
            };
            tool_calls.push(ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                args,
            });
        }
    }

    let usage = TokenUsage {
        input_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
    };

    Ok(Completion {
        message: Message::assistant(text, tool_calls),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-test".into(),
            messages,
            tools: vec![],
            max_tokens: 256,
        }
    }

    #[test]
    fn system_message_stays_in_band() {
        let body = to_api_request(&request(vec![
            Message::system("rules"),
            Message::user("Begin."),
        ]));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "rules");
    }

    #[test]
    fn tool_call_arguments_are_json_strings() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "sh".into(),
            args: json!({"command": "pwd"}).as_object().unwrap().clone(),
        };
        let body = to_api_request(&request(vec![Message::assistant("", vec![call])]));
        let tc = &body["messages"][0]["tool_calls"][0];
        assert_eq!(tc["type"], "function");
        let args: serde_json::Value =
            serde_json::from_str(tc["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["command"], "pwd");
    }

    #[test]
    fn tool_results_become_tool_role_messages() {
        let body = to_api_request(&request(vec![Message::tool_result("call_9", "done", false)]));
        let msg = &body["messages"][0];
        assert_eq!(msg["role"], "tool");
        assert_eq!(msg["tool_call_id"], "call_9");
        assert_eq!(msg["content"], "done");
    }

    #[test]
    fn empty_assistant_content_is_null() {
        let body = to_api_request(&request(vec![Message::assistant("", vec![])]));
        assert!(body["messages"][0]["content"].is_null());
    }

    #[test]
    fn response_parses_tool_calls_with_string_arguments() {
        let completion = from_api_response(&json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "sh", "arguments": "{\"command\":\"ls -la\"}"},
                }],
            }}],
            "usage": {"prompt_tokens": 80, "completion_tokens": 12},
        }))
        .unwrap();
        assert_eq!(completion.message.tool_calls.len(), 1);
        assert_eq!(completion.message.tool_calls[0].args["command"], "ls -la");
        assert_eq!(completion.usage.input_tokens, 80);
    }

    #[test]
    fn response_with_garbage_arguments_yields_empty_args() {
        let completion = from_api_response(&json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_x",
                    "function": {"name": "exit", "arguments": "not json"},
                }],
            }}],
        }))
        .unwrap();
        assert!(completion.message.tool_calls[0].args.is_empty());
    }

    #[test]
    fn missing_choices_is_invalid() {
        let err = from_api_response(&json!({"usage": {}})).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
