//! Agent module - the bounded tool-calling conversation loop
//!
//! The agent drives one conversation turn against the LLM: it appends the
//! user message to memory, calls the model, executes any requested tools,
//! and iterates. Termination is guaranteed by the tool-choice schedule —
//! `auto` for the first `max_auto_iterations` rounds, then a forced `none`
//! that makes the next response terminal — with `max_total_iterations` as a
//! hard ceiling on top.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SwitchboardError};
use crate::llm::{
    ChatOptions, LLMProvider, LLMResponse, Message, StreamEvent, ToolCall, ToolChoice, Usage,
};
use crate::memory::Memory;
use crate::tools::ToolRegistry;

/// An LLM-powered agent with memory and tool capabilities.
pub struct Agent {
    provider: Arc<dyn LLMProvider>,
    memory: Arc<dyn Memory>,
    tools: Arc<ToolRegistry>,
    options: ChatOptions,
    model: Option<String>,
    max_auto_iterations: usize,
    max_total_iterations: usize,
}

impl Agent {
    /// Create an agent with default iteration bounds (3 auto, 10 total).
    pub fn new(provider: Arc<dyn LLMProvider>, memory: Arc<dyn Memory>) -> Self {
        Self {
            provider,
            memory,
            tools: Arc::new(ToolRegistry::new()),
            options: ChatOptions::default(),
            model: None,
            max_auto_iterations: 3,
            max_total_iterations: 10,
        }
    }

    /// Attach a tool registry.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Set pass-through chat options (temperature, max tokens, ...).
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the model for this agent.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Number of iterations that may use tool-choice `auto`.
    pub fn with_max_auto_iterations(mut self, max: usize) -> Self {
        self.max_auto_iterations = max;
        self
    }

    /// Hard ceiling on tool-loop iterations.
    pub fn with_max_total_iterations(mut self, max: usize) -> Self {
        self.max_total_iterations = max;
        self
    }

    /// Process a user message and return the final response text.
    pub async fn run(&self, user_input: &str) -> Result<String> {
        info!("Starting agent run");

        self.memory.add(Message::user(user_input)).await?;
        let messages = self.memory.messages().await?;

        // Initial call: no explicit tool-choice override.
        let response = self.chat(messages, None).await?;
        self.memory.add(response.message.clone()).await?;

        if !response.has_tool_calls() {
            info!("Agent run completed without tool calls");
            return Ok(response.message.content);
        }

        self.run_tool_loop(response.tool_calls().to_vec()).await
    }

    /// The tool-call state machine shared by `run` and `run_stream`.
    ///
    /// Iteration `i` executes the pending tool calls, then calls the LLM
    /// with tool-choice `auto` while `i < max_auto_iterations` and `none`
    /// afterwards. A response without tool calls is terminal.
    async fn run_tool_loop(&self, mut tool_calls: Vec<ToolCall>) -> Result<String> {
        let mut iteration = 0usize;

        loop {
            if iteration >= self.max_total_iterations {
                warn!(
                    iteration,
                    max_total_iterations = self.max_total_iterations,
                    "Maximum total iterations exceeded"
                );
                return Err(SwitchboardError::IterationLimit(self.max_total_iterations));
            }

            debug!(iteration, tool_call_count = tool_calls.len(), "Handling tool calls");
            for tool_call in &tool_calls {
                let reply = self.tools.call(tool_call).await?;
                self.memory.add(reply).await?;
            }

            let tool_choice = if iteration < self.max_auto_iterations {
                ToolChoice::Auto
            } else {
                warn!(iteration, "Forcing tool choice to 'none' due to iteration limit");
                ToolChoice::None
            };

            let messages = self.memory.messages().await?;
            let response = self.chat(messages, Some(tool_choice)).await?;
            self.memory.add(response.message.clone()).await?;

            if response.has_tool_calls() {
                tool_calls = response.tool_calls().to_vec();
                iteration += 1;
                continue;
            }

            info!(iteration, "Tool call chain completed");
            return Ok(response.message.content);
        }
    }

    /// Process a user message, streaming text fragments to `sink`.
    ///
    /// The initial completion is streamed; when it ends in tool calls the
    /// non-streaming state machine continues and the final response text is
    /// also forwarded. Consumers must tolerate the final text arriving
    /// after streamed fragments.
    pub async fn run_stream<F>(&self, user_input: &str, mut sink: F) -> Result<()>
    where
        F: FnMut(&str) + Send,
    {
        info!("Starting agent stream");

        self.memory.add(Message::user(user_input)).await?;
        let messages = self.memory.messages().await?;

        let mut rx = self
            .provider
            .chat_stream(
                messages,
                self.tools.definitions(),
                self.model.as_deref(),
                self.options.clone(),
            )
            .await?;

        let mut streamed = String::new();
        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Delta(delta) => {
                    if !delta.is_empty() {
                        sink(&delta);
                        streamed.push_str(&delta);
                    }
                }
                StreamEvent::ToolCalls(calls) => {
                    debug!(tool_call_count = calls.len(), "Tool calls detected in stream");
                    tool_calls = calls;
                }
                StreamEvent::Done { content: full, .. } => {
                    content = if full.is_empty() { streamed.clone() } else { full };
                }
                StreamEvent::Error(reason) => {
                    return Err(SwitchboardError::Llm(reason));
                }
            }
        }

        let assistant = if tool_calls.is_empty() {
            Message::assistant(&content)
        } else {
            Message::assistant_with_tools(&content, tool_calls.clone())
        };
        self.memory.add(assistant).await?;

        if !tool_calls.is_empty() {
            info!("Processing tool calls from stream");
            sink("\n[Processing tool calls...]\n");
            let final_response = self.run_tool_loop(tool_calls).await?;
            sink(&format!("\n[Final response after tool calls]\n{}", final_response));
        }

        Ok(())
    }

    /// Run a turn while recording every step for offline inspection.
    pub async fn evaluate(&self, user_input: &str) -> Result<AgentEvaluation> {
        info!("Starting agent evaluation");

        let mut eval = AgentEvaluation {
            user_input: user_input.to_string(),
            steps: Vec::new(),
            final_response: String::new(),
        };

        self.memory.add(Message::user(user_input)).await?;
        let messages = self.memory.messages().await?;

        let response = self.chat(messages.clone(), None).await?;
        self.memory.add(response.message.clone()).await?;
        eval.steps.push(AgentStep {
            step_type: "initial".into(),
            input_messages: messages,
            output_message: Some(response.message.clone()),
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            token_usage: response.usage.clone(),
        });

        if !response.has_tool_calls() {
            eval.final_response = response.message.content;
            return Ok(eval);
        }

        let mut tool_calls = response.tool_calls().to_vec();
        let mut iteration = 0usize;

        loop {
            if iteration >= self.max_total_iterations {
                return Err(SwitchboardError::IterationLimit(self.max_total_iterations));
            }

            let mut tool_responses = Vec::new();
            for tool_call in &tool_calls {
                let reply = self.tools.call(tool_call).await?;
                self.memory.add(reply.clone()).await?;
                tool_responses.push(reply);
            }
            eval.steps.push(AgentStep {
                step_type: "tool_execution".into(),
                input_messages: Vec::new(),
                output_message: None,
                tool_calls: tool_calls.clone(),
                tool_responses,
                token_usage: None,
            });

            let tool_choice = if iteration < self.max_auto_iterations {
                ToolChoice::Auto
            } else {
                ToolChoice::None
            };

            let messages = self.memory.messages().await?;
            let response = self.chat(messages.clone(), Some(tool_choice)).await?;
            self.memory.add(response.message.clone()).await?;
            eval.steps.push(AgentStep {
                step_type: "response".into(),
                input_messages: messages,
                output_message: Some(response.message.clone()),
                tool_calls: Vec::new(),
                tool_responses: Vec::new(),
                token_usage: response.usage.clone(),
            });

            if response.has_tool_calls() {
                tool_calls = response.tool_calls().to_vec();
                iteration += 1;
                continue;
            }

            eval.final_response = response.message.content;
            return Ok(eval);
        }
    }

    /// Run several turns in sequence, returning each final response.
    pub async fn run_conversation(&self, user_inputs: &[String]) -> Result<Vec<String>> {
        let mut responses = Vec::with_capacity(user_inputs.len());
        for input in user_inputs {
            responses.push(self.run(input).await?);
        }
        Ok(responses)
    }

    /// Reset the conversation, keeping the system message.
    pub async fn clear_memory(&self) -> Result<()> {
        self.memory.clear().await
    }

    /// Append a message to memory directly.
    pub async fn add_message(&self, message: Message) -> Result<()> {
        self.memory.add(message).await
    }

    /// All messages currently in memory.
    pub async fn messages(&self) -> Result<Vec<Message>> {
        self.memory.messages().await
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tool_choice: Option<ToolChoice>,
    ) -> Result<LLMResponse> {
        let mut options = self.options.clone();
        if let Some(choice) = tool_choice {
            options.tool_choice = Some(choice);
        }
        self.provider
            .chat(
                messages,
                self.tools.definitions(),
                self.model.as_deref(),
                options,
            )
            .await
    }
}

/// Full trace of one evaluated agent turn.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvaluation {
    pub user_input: String,
    pub steps: Vec<AgentStep>,
    pub final_response: String,
}

/// One recorded step of an evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    /// "initial", "tool_execution", or "response".
    pub step_type: String,
    pub input_messages: Vec<Message>,
    pub output_message: Option<Message>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_responses: Vec<Message>,
    pub token_usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMResponse, ToolDefinition};
    use crate::memory::BufferMemory;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"message": {"type": "string"}}})
        }

        async fn call(&self, arguments: &str) -> Result<Value> {
            Ok(json!({"echo": arguments}))
        }
    }

    /// Scripted provider: emits tool calls while tool choice permits,
    /// recording the tool choice of every call.
    struct ScriptedProvider {
        calls: AtomicUsize,
        choices: Mutex<Vec<Option<ToolChoice>>>,
        always_call_tools: bool,
    }

    impl ScriptedProvider {
        fn new(always_call_tools: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                choices: Mutex::new(Vec::new()),
                always_call_tools,
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            options: ChatOptions,
        ) -> Result<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.choices.lock().unwrap().push(options.tool_choice);

            let may_call_tools = options.tool_choice != Some(ToolChoice::None);
            if self.always_call_tools && may_call_tools {
                Ok(LLMResponse::with_tools(
                    "",
                    vec![ToolCall::new(
                        &format!("call_{}", n),
                        "echo",
                        r#"{"message":"hi"}"#,
                    )],
                ))
            } else {
                Ok(LLMResponse::text("final answer"))
            }
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn agent_with(provider: Arc<ScriptedProvider>) -> Agent {
        let memory = Arc::new(BufferMemory::new(Message::system("seed")));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        Agent::new(provider, memory)
            .with_tools(Arc::new(registry))
            .with_max_auto_iterations(2)
            .with_max_total_iterations(5)
    }

    #[tokio::test]
    async fn test_run_without_tool_calls() {
        let provider = Arc::new(ScriptedProvider::new(false));
        let agent = agent_with(Arc::clone(&provider));

        let response = agent.run("hello").await.unwrap();
        assert_eq!(response, "final answer");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let messages = agent.messages().await.unwrap();
        // system, user, assistant
        assert_eq!(messages.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_choice_schedule() {
        let provider = Arc::new(ScriptedProvider::new(true));
        let agent = agent_with(Arc::clone(&provider));

        let response = agent.run("go").await.unwrap();
        assert_eq!(response, "final answer");

        // Initial call plus three loop calls: auto, auto, none.
        let choices = provider.choices.lock().unwrap().clone();
        assert_eq!(
            choices,
            vec![
                None,
                Some(ToolChoice::Auto),
                Some(ToolChoice::Auto),
                Some(ToolChoice::None),
            ]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_tool_replies_carry_call_ids() {
        let provider = Arc::new(ScriptedProvider::new(true));
        let agent = agent_with(provider);
        agent.run("go").await.unwrap();

        let messages = agent.messages().await.unwrap();
        let tool_replies: Vec<_> = messages.iter().filter(|m| m.is_tool_result()).collect();
        assert_eq!(tool_replies.len(), 3);
        assert_eq!(tool_replies[0].tool_call_id.as_deref(), Some("call_0"));
    }

    /// Provider that ignores the tool-choice directive entirely, forcing
    /// the hard iteration ceiling to fire.
    struct RunawayProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LLMProvider for RunawayProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LLMResponse::with_tools(
                "",
                vec![ToolCall::new(&format!("call_{}", n), "echo", "{}")],
            ))
        }

        fn default_model(&self) -> &str {
            "runaway"
        }

        fn name(&self) -> &str {
            "runaway"
        }
    }

    #[tokio::test]
    async fn test_hard_iteration_ceiling() {
        let provider = Arc::new(RunawayProvider {
            calls: AtomicUsize::new(0),
        });
        let memory = Arc::new(BufferMemory::new(Message::system("seed")));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let agent = Agent::new(Arc::clone(&provider) as Arc<dyn LLMProvider>, memory)
            .with_tools(Arc::new(registry))
            .with_max_auto_iterations(2)
            .with_max_total_iterations(4);

        let err = agent.run("go").await.unwrap_err();
        assert!(matches!(err, SwitchboardError::IterationLimit(4)));
        // Initial call plus one per completed iteration.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_tool_failure_aborts_run() {
        struct BrokenTool;

        #[async_trait]
        impl Tool for BrokenTool {
            fn name(&self) -> &str {
                "echo"
            }
            fn description(&self) -> &str {
                "fails"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object", "properties": {}})
            }
            async fn call(&self, _arguments: &str) -> Result<Value> {
                Err(SwitchboardError::ToolExecution {
                    name: "echo".into(),
                    reason: "boom".into(),
                })
            }
        }

        let provider = Arc::new(ScriptedProvider::new(true));
        let memory = Arc::new(BufferMemory::new(Message::system("seed")));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(BrokenTool));
        let agent = Agent::new(provider, memory).with_tools(Arc::new(registry));

        let err = agent.run("go").await.unwrap_err();
        assert!(matches!(err, SwitchboardError::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn test_run_stream_forwards_deltas_and_final() {
        let provider = Arc::new(ScriptedProvider::new(true));
        let agent = agent_with(provider);

        let chunks = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
        let sink_chunks = std::sync::Arc::clone(&chunks);
        agent
            .run_stream("go", move |chunk| {
                sink_chunks.lock().unwrap().push(chunk.to_string());
            })
            .await
            .unwrap();

        let collected = chunks.lock().unwrap().join("");
        assert!(collected.contains("[Processing tool calls...]"));
        assert!(collected.contains("[Final response after tool calls]\nfinal answer"));
    }

    #[tokio::test]
    async fn test_run_stream_plain_text() {
        let provider = Arc::new(ScriptedProvider::new(false));
        let agent = agent_with(provider);

        let chunks = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
        let sink_chunks = std::sync::Arc::clone(&chunks);
        agent
            .run_stream("hello", move |chunk| {
                sink_chunks.lock().unwrap().push(chunk.to_string());
            })
            .await
            .unwrap();

        assert_eq!(chunks.lock().unwrap().join(""), "final answer");

        // Assembled assistant message landed in memory.
        let messages = agent.messages().await.unwrap();
        assert_eq!(messages.last().unwrap().content, "final answer");
    }

    #[tokio::test]
    async fn test_evaluate_records_steps() {
        let provider = Arc::new(ScriptedProvider::new(true));
        let agent = agent_with(provider);

        let eval = agent.evaluate("go").await.unwrap();
        assert_eq!(eval.final_response, "final answer");
        assert_eq!(eval.steps[0].step_type, "initial");
        assert!(eval
            .steps
            .iter()
            .any(|s| s.step_type == "tool_execution" && !s.tool_responses.is_empty()));
        assert_eq!(eval.steps.last().unwrap().step_type, "response");
    }

    #[tokio::test]
    async fn test_run_conversation() {
        let provider = Arc::new(ScriptedProvider::new(false));
        let agent = agent_with(provider);
        let responses = agent
            .run_conversation(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_memory_keeps_system() {
        let provider = Arc::new(ScriptedProvider::new(false));
        let agent = agent_with(provider);
        agent.run("hello").await.unwrap();
        agent.clear_memory().await.unwrap();

        let messages = agent.messages().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, crate::llm::Role::System);
    }
}
