// crates/wavenodes/tests/nodes_test.rs

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio::sync::broadcast;
use wavecore::{
    ConfiguredNode, EventBus, EventEmitter, NodeContext, NodeEvent, NodeExecutionError,
    NodeInputs, NodeRegistry, NodeType, RunEvent, RunId, Value,
};
use wavenodes::{
    render, GenerationError, GenerationRequest, NodeExecutor, OpenAiConfig, OpenAiGenerator,
    TextGenerator,
};

/// Generator that replies with a fixed text and remembers every request.
struct ScriptedGenerator {
    reply: Result<String, GenerationError>,
    calls: AtomicUsize,
    last: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    fn failing(error: GenerationError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        _cancel: CancellationToken,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        self.reply.clone()
    }
}

// Helper to build a node the way the runtime does: registry defaults plus overrides
fn configured(id: &str, node_type: NodeType, overrides: serde_json::Value) -> ConfiguredNode {
    let registry = NodeRegistry::builtin();
    let descriptor = registry.lookup(node_type).unwrap();
    let overrides = match overrides {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    let mut node = ConfiguredNode::new(id, descriptor.merge(&overrides).unwrap());
    node.required = descriptor.required_fields();
    node
}

fn context(id: &str) -> NodeContext {
    NodeContext::new(id, EventEmitter::detached(id))
}

// Context wired to a live bus so node events can be observed
fn observed(id: &str) -> (NodeContext, broadcast::Receiver<RunEvent>) {
    let bus = EventBus::new(16);
    let events = bus.subscribe();
    let ctx = NodeContext::new(id, bus.create_emitter(RunId::nil(), id.to_string()));
    (ctx, events)
}

fn node_events(events: &mut broadcast::Receiver<RunEvent>) -> Vec<NodeEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RunEvent::NodeEvent { event, .. } = event {
            collected.push(event);
        }
    }
    collected
}

fn single(source: &str, value: serde_json::Value) -> NodeInputs {
    let mut inputs = NodeInputs::new();
    inputs.insert(source, Value::from(value));
    inputs
}

#[tokio::test]
async fn test_webhook_emits_trigger_payload() {
    let executor = NodeExecutor::new();
    let node = configured("hook", NodeType::Webhook, json!({}));
    let ctx = context("hook").with_payload(Value::from(json!({ "value": 3 })));

    let output = executor.execute(&node, &NodeInputs::new(), &ctx).await.unwrap();
    assert_eq!(output, Value::from(json!({ "value": 3 })));
}

#[tokio::test]
async fn test_webhook_without_payload_echoes_config() {
    let executor = NodeExecutor::new();
    let node = configured("hook", NodeType::Webhook, json!({ "method": "GET", "path": "/in" }));

    let output = executor
        .execute(&node, &NodeInputs::new(), &context("hook"))
        .await
        .unwrap();
    assert_eq!(output, Value::from(json!({ "method": "GET", "path": "/in" })));
}

#[tokio::test]
async fn test_math_reads_field_then_number() {
    let executor = NodeExecutor::new();
    let node = configured("double", NodeType::Math, json!({ "operation": "multiply", "operand": 2 }));

    let from_object = executor
        .execute(&node, &single("hook", json!({ "value": 3 })), &context("double"))
        .await
        .unwrap();
    assert_eq!(from_object, Value::Number(6.0));

    let from_number = executor
        .execute(&node, &single("prev", json!(6)), &context("double"))
        .await
        .unwrap();
    assert_eq!(from_number, Value::Number(12.0));
}

#[tokio::test]
async fn test_math_divide_by_zero_is_transform_error() {
    let executor = NodeExecutor::new();
    let node = configured("div", NodeType::Math, json!({ "operation": "divide", "operand": 0 }));

    let err = executor
        .execute(&node, &single("hook", json!(10)), &context("div"))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeExecutionError::TransformError(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_math_rejects_non_numeric_input() {
    let executor = NodeExecutor::new();
    let node = configured("double", NodeType::Math, json!({}));

    let err = executor
        .execute(&node, &single("hook", json!({ "value": "three" })), &context("double"))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeExecutionError::TransformError(_)));
}

#[tokio::test]
async fn test_single_input_behavior_rejects_fan_in() {
    let executor = NodeExecutor::new();
    let node = configured("double", NodeType::Math, json!({}));

    let mut inputs = NodeInputs::new();
    inputs.insert("a", Value::Number(1.0));
    inputs.insert("b", Value::Number(2.0));

    let err = executor
        .execute(&node, &inputs, &context("double"))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeExecutionError::TransformError(_)));
}

#[tokio::test]
async fn test_template_renders_inputs_by_source_and_input() {
    let executor = NodeExecutor::new();
    let node = configured(
        "greet",
        NodeType::Template,
        json!({ "template": "Hello {{input.name}} via {{hook.channel}}{{missing}}" }),
    );

    let output = executor
        .execute(
            &node,
            &single("hook", json!({ "name": "Ada", "channel": "web" })),
            &context("greet"),
        )
        .await
        .unwrap();
    assert_eq!(output, Value::from("Hello Ada via web"));
}

#[tokio::test]
async fn test_template_without_text_is_invalid_config() {
    let executor = NodeExecutor::new();
    let node = configured("greet", NodeType::Template, json!({}));

    let err = executor
        .execute(&node, &NodeInputs::new(), &context("greet"))
        .await
        .unwrap_err();
    assert_eq!(err, NodeExecutionError::invalid_config("template"));
}

#[tokio::test]
async fn test_set_fields_keeps_input_and_renders_strings() {
    let executor = NodeExecutor::new();
    let node = configured(
        "set",
        NodeType::SetFields,
        json!({ "keepInput": true, "fields": { "greeting": "hi {{input.name}}", "n": 1 } }),
    );

    let output = executor
        .execute(&node, &single("hook", json!({ "name": "Bo" })), &context("set"))
        .await
        .unwrap();
    assert_eq!(
        output,
        Value::from(json!({ "name": "Bo", "greeting": "hi Bo", "n": 1 }))
    );
}

#[tokio::test]
async fn test_json_parse_and_stringify() {
    let executor = NodeExecutor::new();

    let parse = configured("parse", NodeType::JsonParse, json!({ "field": "body" }));
    let parsed = executor
        .execute(
            &parse,
            &single("hook", json!({ "body": "{\"ok\":true,\"n\":[1,2]}" })),
            &context("parse"),
        )
        .await
        .unwrap();
    assert_eq!(parsed, Value::from(json!({ "ok": true, "n": [1, 2] })));

    let broken = executor
        .execute(&parse, &single("hook", json!({ "body": "{nope" })), &context("parse"))
        .await
        .unwrap_err();
    assert!(matches!(broken, NodeExecutionError::TransformError(_)));

    let stringify = configured("str", NodeType::JsonStringify, json!({}));
    let text = executor
        .execute(&stringify, &single("parse", json!({ "a": 1 })), &context("str"))
        .await
        .unwrap();
    assert_eq!(text, Value::from("{\"a\":1}"));
}

#[tokio::test]
async fn test_condition_reports_branch() {
    let executor = NodeExecutor::new();
    let node = configured(
        "check",
        NodeType::Condition,
        json!({ "field": "score", "operator": "greaterThan", "value": 5 }),
    );

    let high = executor
        .execute(&node, &single("hook", json!({ "score": 9 })), &context("check"))
        .await
        .unwrap();
    assert_eq!(high.get_path("matched"), Some(&Value::Bool(true)));
    assert_eq!(high.get_path("branch"), Some(&Value::from("true")));

    let low = executor
        .execute(&node, &single("hook", json!({ "score": 1 })), &context("check"))
        .await
        .unwrap();
    assert_eq!(low.get_path("branch"), Some(&Value::from("false")));
    assert_eq!(low.get_path("input.score"), Some(&Value::Number(1.0)));
}

#[tokio::test]
async fn test_merge_combines_inputs_by_source() {
    let executor = NodeExecutor::new();
    let mut inputs = NodeInputs::new();
    inputs.insert("b", Value::from("second"));
    inputs.insert("a", Value::from("first"));

    let as_object = configured("join", NodeType::Merge, json!({ "mode": "object" }));
    let output = executor
        .execute(&as_object, &inputs, &context("join"))
        .await
        .unwrap();
    assert_eq!(output, Value::from(json!({ "a": "first", "b": "second" })));

    let as_array = configured("join", NodeType::Merge, json!({ "mode": "array" }));
    let output = executor
        .execute(&as_array, &inputs, &context("join"))
        .await
        .unwrap();
    assert_eq!(output, Value::from(json!(["first", "second"])));
}

#[tokio::test]
async fn test_delay_passes_input_through() {
    let executor = NodeExecutor::new();
    let node = configured("wait", NodeType::Delay, json!({ "durationMs": 5 }));

    let output = executor
        .execute(&node, &single("hook", json!({ "k": "v" })), &context("wait"))
        .await
        .unwrap();
    assert_eq!(output, Value::from(json!({ "k": "v" })));
}

#[tokio::test]
async fn test_delay_stops_when_cancelled() {
    let executor = NodeExecutor::new();
    let node = configured("wait", NodeType::Delay, json!({ "durationMs": 60000 }));
    let token = CancellationToken::new();
    let ctx = context("wait").with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = executor
        .execute(&node, &NodeInputs::new(), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err, NodeExecutionError::Cancelled);
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_delay_reports_progress() {
    let executor = NodeExecutor::new();
    let node = configured("wait", NodeType::Delay, json!({ "durationMs": 1 }));
    let (ctx, mut events) = observed("wait");

    executor
        .execute(&node, &NodeInputs::new(), &ctx)
        .await
        .unwrap();

    let percents: Vec<f64> = node_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            NodeEvent::Progress { percent, .. } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![0.0, 100.0]);
}

#[tokio::test]
async fn test_trigger_with_upstream_inputs_warns() {
    let executor = NodeExecutor::new();
    let node = configured("hook", NodeType::Webhook, json!({}));
    let (ctx, mut events) = observed("hook");
    let ctx = ctx.with_payload(Value::from(json!({ "id": 7 })));

    let output = executor
        .execute(&node, &single("upstream", json!(1)), &ctx)
        .await
        .unwrap();
    assert_eq!(output, Value::from(json!({ "id": 7 })));

    let warnings: Vec<_> = node_events(&mut events)
        .into_iter()
        .filter(|event| matches!(event, NodeEvent::Warning { .. }))
        .collect();
    assert_eq!(warnings.len(), 1);
}

#[tokio::test]
async fn test_trigger_without_inputs_is_quiet() {
    let executor = NodeExecutor::new();
    let node = configured("hook", NodeType::Webhook, json!({}));
    let (ctx, mut events) = observed("hook");

    executor
        .execute(&node, &NodeInputs::new(), &ctx)
        .await
        .unwrap();
    assert!(node_events(&mut events)
        .iter()
        .all(|event| !matches!(event, NodeEvent::Warning { .. })));
}

#[tokio::test]
async fn test_text_generator_receives_rendered_prompt() {
    let generator = ScriptedGenerator::replying("Dear Ada, thanks!");
    let executor = NodeExecutor::with_generator(generator.clone());
    let node = configured(
        "writer",
        NodeType::AiTextGenerator,
        json!({ "prompt": "Thank {{input.name}}", "model": "test-model", "systemPrompt": "Be kind" }),
    );

    let output = executor
        .execute(&node, &single("hook", json!({ "name": "Ada" })), &context("writer"))
        .await
        .unwrap();
    assert_eq!(output, Value::from("Dear Ada, thanks!"));

    let request = generator.last.lock().unwrap().clone().unwrap();
    assert_eq!(request.prompt, "Thank Ada");
    assert_eq!(request.model, "test-model");
    assert_eq!(request.system.as_deref(), Some("Be kind"));
}

#[tokio::test]
async fn test_prompt_without_placeholders_gets_context_appended() {
    let generator = ScriptedGenerator::replying("ok");
    let executor = NodeExecutor::with_generator(generator.clone());
    let node = configured("writer", NodeType::AiTextGenerator, json!({ "prompt": "Summarise" }));

    executor
        .execute(&node, &single("hook", json!("the text")), &context("writer"))
        .await
        .unwrap();

    let request = generator.last.lock().unwrap().clone().unwrap();
    assert_eq!(request.prompt, "Summarise\n\nContext:\nthe text");
}

#[tokio::test]
async fn test_missing_prompt_fails_before_provider_call() {
    let generator = ScriptedGenerator::replying("never");
    let executor = NodeExecutor::with_generator(generator.clone());
    let node = configured("writer", NodeType::AiTextGenerator, json!({ "prompt": "   " }));

    let err = executor
        .execute(&node, &NodeInputs::new(), &context("writer"))
        .await
        .unwrap_err();
    assert_eq!(err, NodeExecutionError::invalid_config("prompt"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ai_without_provider_reports_missing_credentials() {
    let executor = NodeExecutor::new();
    assert!(!executor.has_generator());

    let node = configured("writer", NodeType::AiTextGenerator, json!({ "prompt": "Hi" }));
    let err = executor
        .execute(&node, &NodeInputs::new(), &context("writer"))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeExecutionError::MissingCredentials(_)));
}

#[tokio::test]
async fn test_provider_failure_maps_to_node_error() {
    let generator = ScriptedGenerator::failing(GenerationError::Provider("503".to_string()));
    let executor = NodeExecutor::with_generator(generator);
    let node = configured("writer", NodeType::AiTextGenerator, json!({ "prompt": "Hi" }));

    let err = executor
        .execute(&node, &NodeInputs::new(), &context("writer"))
        .await
        .unwrap_err();
    assert_eq!(err, NodeExecutionError::ProviderFailure("503".to_string()));
}

#[tokio::test]
async fn test_analyser_keywords_are_split() {
    let generator = ScriptedGenerator::replying("rust, graphs , async");
    let executor = NodeExecutor::with_generator(generator);
    let node = configured("kw", NodeType::AiAnalyser, json!({ "analysisType": "keywords" }));

    let output = executor
        .execute(&node, &single("doc", json!("some text")), &context("kw"))
        .await
        .unwrap();
    assert_eq!(output.get_path("analysisType"), Some(&Value::from("keywords")));
    assert_eq!(
        output.get_path("keywords"),
        Some(&Value::from(json!(["rust", "graphs", "async"])))
    );
}

#[tokio::test]
async fn test_classification_requires_categories() {
    let generator = ScriptedGenerator::replying("never");
    let executor = NodeExecutor::with_generator(generator.clone());
    let node = configured(
        "classify",
        NodeType::AiAnalyser,
        json!({ "analysisType": "classification" }),
    );

    let err = executor
        .execute(&node, &single("doc", json!("text")), &context("classify"))
        .await
        .unwrap_err();
    assert_eq!(err, NodeExecutionError::invalid_config("categories"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_openai_generator_requires_api_key() {
    let generator = OpenAiGenerator::new(OpenAiConfig {
        api_key: "  ".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
    });
    let request = GenerationRequest {
        prompt: "hi".to_string(),
        system: None,
        model: "gpt-4o-mini".to_string(),
        temperature: 0.7,
        max_tokens: None,
    };

    let err = generator
        .generate(request, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingCredentials(_)));
}

fn openai_request() -> GenerationRequest {
    GenerationRequest {
        prompt: "hi".to_string(),
        system: None,
        model: "gpt-4o-mini".to_string(),
        temperature: 0.7,
        max_tokens: None,
    }
}

#[tokio::test]
async fn test_openai_generator_honours_prior_cancellation() {
    let generator = OpenAiGenerator::new(OpenAiConfig {
        api_key: "sk-test".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
    });
    let token = CancellationToken::new();
    token.cancel();

    let err = generator.generate(openai_request(), token).await.unwrap_err();
    assert_eq!(err, GenerationError::Cancelled);
}

#[tokio::test]
async fn test_openai_generator_cancels_while_reading_body() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Server sends headers promising a body it never delivers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{")
            .await
            .unwrap();
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    });

    let generator = OpenAiGenerator::new(OpenAiConfig {
        api_key: "sk-test".to_string(),
        base_url: format!("http://{}", addr),
    });
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let err = tokio::time::timeout(
        tokio::time::Duration::from_secs(5),
        generator.generate(openai_request(), token),
    )
    .await
    .expect("generation should stop once cancelled")
    .unwrap_err();
    assert_eq!(err, GenerationError::Cancelled);

    canceller.await.unwrap();
    server.abort();
}

#[test]
fn test_render_leaves_plain_text_untouched() {
    let scope = Value::from(json!({ "input": { "x": 1 } }));
    assert_eq!(render("no placeholders", &scope), "no placeholders");
    assert_eq!(render("x={{ input.x }}", &scope), "x=1");
}
