use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use genu_core::tools::{Tool, ToolError, ToolRegistry};
use genu_core::{Agent, AgentError, AgentEvent};
use genu_llm::{
    BinarySource, ContentBlock, ImageBlock, Message, Prompt, Role, ScriptedModel, StreamEvent,
    ToolResultContent, ToolResultStatus,
};
use serde_json::{json, Value};

struct Upper;

#[async_trait]
impl Tool for Upper {
    fn name(&self) -> String {
        "upper".to_string()
    }

    fn description(&self) -> String {
        "Uppercase a word".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"word": {"type": "string"}}, "required": ["word"]})
    }

    async fn invoke(&self, input: Value) -> Result<Vec<ToolResultContent>, ToolError> {
        let word = input["word"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidInput("word".to_string()))?;
        Ok(vec![ToolResultContent::Text(word.to_uppercase())])
    }
}

async fn collect(agent: Agent, prompt: &str) -> Vec<Result<AgentEvent, AgentError>> {
    agent.stream(prompt).collect().await
}

#[tokio::test]
async fn relays_events_then_final_message() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text_turn("Hello!")]));
    let agent = Agent::builder(model.clone())
        .system_prompt("be nice")
        .messages(vec![Message::user_text("earlier"), Message::assistant_text("ok")])
        .build();

    let events = collect(agent, "hi").await;
    let events: Vec<AgentEvent> = events.into_iter().map(Result::unwrap).collect();

    assert_eq!(events.len(), 5);
    assert!(events[..4].iter().all(|e| matches!(e, AgentEvent::Event(_))));
    assert_eq!(
        events[4],
        AgentEvent::Message(Message::assistant_text("Hello!"))
    );

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system_prompt.as_deref(), Some("be nice"));
    assert_eq!(requests[0].messages.len(), 3);
    assert_eq!(requests[0].messages[2], Message::user_text("hi"));
}

#[tokio::test]
async fn empty_prompt_is_not_appended() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text_turn("ok")]));
    let agent = Agent::builder(model.clone())
        .messages(vec![Message::user_text("question")])
        .build();

    collect(agent, "").await;
    assert_eq!(model.requests()[0].messages.len(), 1);
}

#[tokio::test]
async fn block_prompt_becomes_one_user_message() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text_turn("A cat.")]));
    let agent = Agent::builder(model.clone()).build();

    let blocks = vec![
        ContentBlock::Text("what is this?".to_string()),
        ContentBlock::Image(ImageBlock {
            format: Some("png".to_string()),
            source: Some(BinarySource {
                bytes: "aGk=".to_string(),
            }),
        }),
    ];
    let events: Vec<_> = agent.stream(Prompt::Blocks(blocks.clone())).collect().await;
    assert!(events.iter().all(Result::is_ok));

    let requests = model.requests();
    assert_eq!(requests[0].messages, vec![Message::new(Role::User, blocks)]);
}

#[tokio::test]
async fn empty_block_prompt_is_not_appended() {
    let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text_turn("ok")]));
    let agent = Agent::builder(model.clone())
        .messages(vec![Message::user_text("question")])
        .build();

    let prompt = Prompt::Blocks(vec![ContentBlock::Text(String::new())]);
    let _: Vec<_> = agent.stream(prompt).collect().await;
    assert_eq!(model.requests()[0].messages.len(), 1);
}

#[tokio::test]
async fn runs_tools_between_model_calls() {
    let model = Arc::new(ScriptedModel::new(vec![
        ScriptedModel::tool_turn("tu-1", "upper", &json!({"word": "rust"})),
        ScriptedModel::text_turn("It is RUST."),
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(Upper));
    let agent = Agent::builder(model.clone()).tools(tools).build();

    let events: Vec<AgentEvent> = collect(agent, "shout rust")
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let messages: Vec<&Message> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Message(m) => Some(m),
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    match &messages[1].content[0] {
        ContentBlock::ToolResult(result) => {
            assert_eq!(result.tool_use_id, "tu-1");
            assert_eq!(result.status, ToolResultStatus::Success);
            assert_eq!(result.content, vec![ToolResultContent::Text("RUST".to_string())]);
        }
        other => panic!("expected tool result, got {:?}", other),
    }
    assert_eq!(messages[2].text(), "It is RUST.");

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "upper");
    // prompt, assistant tool call, tool result
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn stops_at_cycle_limit() {
    let model = Arc::new(ScriptedModel::new(vec![
        ScriptedModel::tool_turn("tu-1", "upper", &json!({"word": "a"})),
        ScriptedModel::tool_turn("tu-2", "upper", &json!({"word": "b"})),
    ]));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(Upper));
    let agent = Agent::builder(model).tools(tools).max_cycles(1).build();

    let events = collect(agent, "loop").await;
    assert!(matches!(
        events.last(),
        Some(Err(AgentError::CycleLimit(1)))
    ));
}

#[tokio::test]
async fn model_failure_ends_stream_with_error() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let agent = Agent::builder(model).build();

    let events = collect(agent, "hi").await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(AgentError::Model(_))));
}

#[tokio::test]
async fn truncated_stream_is_incomplete() {
    let mut turn = ScriptedModel::text_turn("cut");
    turn.pop();
    let model = Arc::new(ScriptedModel::new(vec![turn]));
    let agent = Agent::builder(model).build();

    let events = collect(agent, "hi").await;
    assert!(matches!(
        events.last(),
        Some(Err(AgentError::IncompleteResponse))
    ));
    assert_eq!(events.len(), 4);
}

#[test]
fn events_serialize_as_event_or_message() {
    let event = AgentEvent::Message(Message::assistant_text("hi"));
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        json!({"message": {"role": "assistant", "content": [{"text": "hi"}]}})
    );

    let event = AgentEvent::Event(StreamEvent::MessageStart {
        role: Role::Assistant,
    });
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        json!({"event": {"messageStart": {"role": "assistant"}}})
    );
}
