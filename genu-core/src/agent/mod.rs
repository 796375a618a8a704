use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use genu_llm::{
    ContentBlock, LlmError, Message, MessageAssembler, Model, ModelRequest, Prompt, Role,
    StopReason, StreamEvent, ToolUse,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_CYCLES: usize = 20;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] LlmError),
    #[error("model stream ended before the message was complete")]
    IncompleteResponse,
    #[error("agent stopped after {0} model calls without finishing")]
    CycleLimit(usize),
}

/// What the agent emits while answering: raw model stream events, and every
/// complete message (assistant turns and tool results) as it is appended to the history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentEvent {
    Event(StreamEvent),
    Message(Message),
}

impl AgentEvent {
    /// The message, when this is an assistant-role message event
    pub fn assistant_message(&self) -> Option<&Message> {
        match self {
            AgentEvent::Message(message) if message.role == Role::Assistant => Some(message),
            _ => None,
        }
    }
}

pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// A model plus conversation state and tools, driven one prompt at a time
pub struct Agent {
    model: Arc<dyn Model>,
    system_prompt: Option<String>,
    messages: Vec<Message>,
    tools: ToolRegistry,
    max_cycles: usize,
}

pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            agent: Agent {
                model,
                system_prompt: None,
                messages: Vec::new(),
                tools: ToolRegistry::new(),
                max_cycles: DEFAULT_MAX_CYCLES,
            },
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.agent.system_prompt = Some(prompt.into());
        self
    }

    /// Conversation history preceding the prompt
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.agent.messages = messages;
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.agent.tools = tools;
        self
    }

    pub fn max_cycles(mut self, max_cycles: usize) -> Self {
        self.agent.max_cycles = max_cycles.max(1);
        self
    }

    pub fn build(self) -> Agent {
        self.agent
    }
}

impl Agent {
    pub fn builder(model: Arc<dyn Model>) -> AgentBuilder {
        AgentBuilder::new(model)
    }

    /// Answer `prompt`, calling tools as the model requests them.
    ///
    /// Each model call relays its stream events, then emits the assembled assistant
    /// message. On a `tool_use` stop every requested tool runs and the results are
    /// emitted as a user message before the model is called again.
    pub fn stream(self, prompt: impl Into<Prompt>) -> AgentStream {
        let Agent {
            model,
            system_prompt,
            mut messages,
            tools,
            max_cycles,
        } = self;
        let prompt = prompt.into();

        Box::pin(async_stream::stream! {
            if let Some(message) = prompt.into_message() {
                messages.push(message);
            }

            let specs = tools.specs();
            let mut cycle = 0;
            loop {
                cycle += 1;
                if cycle > max_cycles {
                    yield Err(AgentError::CycleLimit(max_cycles));
                    return;
                }

                debug!("model {} cycle {} ({} messages)", model.model_id(), cycle, messages.len());
                let request = ModelRequest {
                    system_prompt: system_prompt.clone(),
                    messages: messages.clone(),
                    tools: specs.clone(),
                };
                let mut events = match model.stream(request).await {
                    Ok(events) => events,
                    Err(e) => {
                        yield Err(AgentError::from(e));
                        return;
                    }
                };

                let mut assembler = MessageAssembler::new();
                while let Some(event) = events.next().await {
                    match event {
                        Ok(event) => {
                            assembler.apply(&event);
                            yield Ok(AgentEvent::Event(event));
                        }
                        Err(e) => {
                            yield Err(AgentError::from(e));
                            return;
                        }
                    }
                }

                let assembled = match assembler.finish() {
                    Ok(Some(assembled)) => assembled,
                    Ok(None) => {
                        yield Err(AgentError::IncompleteResponse);
                        return;
                    }
                    Err(e) => {
                        yield Err(AgentError::from(e));
                        return;
                    }
                };

                let tool_uses: Vec<ToolUse> = assembled.message.tool_uses().cloned().collect();
                messages.push(assembled.message.clone());
                yield Ok(AgentEvent::Message(assembled.message));

                if assembled.stop_reason != StopReason::ToolUse || tool_uses.is_empty() {
                    info!("model {} finished: {:?}", model.model_id(), assembled.stop_reason);
                    break;
                }

                let mut results = Vec::with_capacity(tool_uses.len());
                for tool_use in &tool_uses {
                    results.push(ContentBlock::ToolResult(tools.run(tool_use).await));
                }
                let tool_message = Message::new(Role::User, results);
                messages.push(tool_message.clone());
                yield Ok(AgentEvent::Message(tool_message));
            }
        })
    }
}
