use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use evalpad_core::client::{JsonPathResponse, PredicateResponse, RenderResponse};
use evalpad_core::error::ClientResult;
use evalpad_core::{
    shared, Draft, EvalBackend, EvalpadConfig, KeyValueStore, MemoryStore, OutputFormat, PresetError,
    SharedStore, TextPane, ToolKind, ToolSession,
};

/// Echoes the template back as the rendered text and records every call.
struct EchoBackend {
    calls: Mutex<Vec<String>>,
    predicate_reply: PredicateResponse,
    path_reply: JsonPathResponse,
    /// Answer path queries with the queried document's `v` field.
    echo_paths: bool,
}

impl EchoBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            predicate_reply: PredicateResponse {
                ok: json!(true),
                result: Some(json!(true)),
                ..Default::default()
            },
            path_reply: JsonPathResponse {
                result: Some(vec![json!("first")]),
                error: None,
            },
            echo_paths: false,
        })
    }

    fn echoing_paths() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            predicate_reply: PredicateResponse::default(),
            path_reply: JsonPathResponse::default(),
            echo_paths: true,
        })
    }

    fn with_predicate_reply(reply: PredicateResponse) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            predicate_reply: reply,
            path_reply: JsonPathResponse::default(),
            echo_paths: false,
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EvalBackend for EchoBackend {
    async fn render(&self, template: &str, _data: &Value) -> ClientResult<RenderResponse> {
        self.record(format!("render:{}", template));
        Ok(RenderResponse {
            ok: json!(true),
            result: Some(Value::String(template.to_string())),
            error: None,
        })
    }

    async fn jsonpath(&self, json: &Value, path: &str) -> ClientResult<JsonPathResponse> {
        self.record(format!("jsonpath:{}", path));
        if self.echo_paths {
            return Ok(JsonPathResponse {
                result: Some(json.get("v").cloned().into_iter().collect()),
                error: None,
            });
        }
        Ok(self.path_reply.clone())
    }

    async fn predicate(&self, condition: &str, _data: &Value) -> ClientResult<PredicateResponse> {
        self.record(format!("predicate:{}", condition));
        Ok(self.predicate_reply.clone())
    }
}

fn config(render_delay_ms: u64, persist_delay_ms: u64) -> EvalpadConfig {
    let mut config = EvalpadConfig::default();
    config.timing.render_delay_ms = render_delay_ms;
    config.timing.persist_delay_ms = persist_delay_ms;
    config
}

fn stored(store: &SharedStore, key: &str) -> Option<String> {
    store.lock().unwrap().get(key).unwrap()
}

fn jinja_session(backend: Arc<EchoBackend>, store: SharedStore) -> ToolSession {
    let mut session = ToolSession::new(ToolKind::Jinja, &config(1000, 1000), store, backend);
    session.panes.data.set_value(r#"{"name": "Ada"}"#.to_string());
    session
}

#[tokio::test]
async fn test_burst_of_edits_evaluates_once() {
    let backend = EchoBackend::new();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));

    for i in 0..10u64 {
        session.panes.primary.edit(format!("{{\"step\": {}}}", i));
        assert!(session.tick(i * 100).is_none());
    }
    // Last edit at 900, so the quiet period ends at 1900.
    assert!(session.tick(1899).is_none());
    let job = session.tick(1900).expect("evaluation after quiet period");
    assert!(session.tick(5000).is_none());

    let outcome = job.run().await;
    assert!(session.apply(outcome));

    assert_eq!(backend.count("render:"), 1);
    assert_eq!(backend.calls()[0], "render:{\"step\": 9}");
    assert_eq!(session.panes.output.value(), "{\n  \"step\": 9\n}");
}

#[tokio::test]
async fn test_render_then_path_query_fill_both_panes() {
    let backend = EchoBackend::new();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));
    session.panes.primary.set_value(r#"{"messages":[{"content":"hi"}]}"#.to_string());

    let job = session.evaluate_now();
    assert_eq!(session.in_flight(), 1);
    session.apply(job.run().await);

    assert_eq!(session.in_flight(), 0);
    assert_eq!(
        backend.calls(),
        vec![
            "render:{\"messages\":[{\"content\":\"hi\"}]}".to_string(),
            "jsonpath:$.messages[0].content".to_string(),
        ]
    );
    assert_eq!(session.panes.derived.value(), "first");
}

#[tokio::test]
async fn test_persist_timer_is_independent_of_evaluation() {
    let backend = EchoBackend::new();
    let store = shared(MemoryStore::new());
    let mut session = ToolSession::new(ToolKind::Jinja, &config(1000, 200), store.clone(), backend.clone());

    session.panes.primary.edit("{{ name }}");
    assert!(session.tick(0).is_none());
    assert!(session.is_persist_pending());
    assert_eq!(session.next_deadline(), Some(200));

    assert!(session.tick(200).is_none());
    assert_eq!(stored(&store, "jinja2_template").as_deref(), Some("{{ name }}"));
    assert!(!session.is_persist_pending());
    assert!(session.is_evaluation_pending());
    assert_eq!(backend.count("render:"), 0);

    assert!(session.tick(1000).is_some());
}

#[tokio::test]
async fn test_stale_outcome_is_dropped() {
    let backend = EchoBackend::new();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));

    session.panes.primary.set_value(r#"{"v": 1}"#.to_string());
    let first = session.evaluate_now();
    session.panes.primary.set_value(r#"{"v": 2}"#.to_string());
    let second = session.evaluate_now();
    assert!(second.generation() > first.generation());

    let first_outcome = first.run().await;
    let second_outcome = second.run().await;

    // Replies arrive out of order.
    assert!(session.apply(second_outcome));
    assert!(!session.apply(first_outcome));

    assert_eq!(session.panes.output.value(), "{\n  \"v\": 2\n}");
    assert_eq!(session.in_flight(), 0);
}

#[tokio::test]
async fn test_format_switch_reformats_without_rendering() {
    let backend = EchoBackend::new();
    let store = shared(MemoryStore::new());
    let mut session = jinja_session(backend.clone(), store.clone());
    session.panes.primary.set_value(r#"{"a":"café"}"#.to_string());

    let job = session.evaluate_now();
    session.apply(job.run().await);
    assert_eq!(session.panes.output.value(), "{\n  \"a\": \"café\"\n}");

    let path_job = session.set_format(OutputFormat::Text).expect("path query over new text");
    assert!(path_job.is_path_only());
    assert_eq!(session.panes.output.value(), r#"{"a":"café"}"#);
    assert_eq!(stored(&store, "jinja2_output_format").as_deref(), Some("text"));

    session.apply(path_job.run().await);
    assert_eq!(backend.count("render:"), 1);
    assert_eq!(backend.count("jsonpath:"), 2);

    // Same format again is a no-op.
    assert!(session.set_format(OutputFormat::Text).is_none());
}

#[tokio::test]
async fn test_format_switch_during_render_uses_new_format() {
    let backend = EchoBackend::new();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));
    session.panes.primary.set_value(r#"{"v":"café"}"#.to_string());

    let job = session.evaluate_now();
    // Nothing rendered yet, so there is nothing to reformat or query.
    assert!(session.set_format(OutputFormat::Text).is_none());
    session.apply(job.run().await);

    assert_eq!(session.format(), OutputFormat::Text);
    assert_eq!(session.panes.output.value(), r#"{"v":"café"}"#);
    assert!(session.is_path_refresh_pending());

    let path_job = session.tick(0).expect("path query over the text output");
    assert!(path_job.is_path_only());
    session.apply(path_job.run().await);
    assert!(!session.is_path_refresh_pending());
    assert_eq!(backend.count("render:"), 1);
    assert_eq!(backend.count("jsonpath:"), 2);
}

#[tokio::test]
async fn test_query_change_during_render_follows_new_output() {
    let backend = EchoBackend::echoing_paths();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));
    session.panes.primary.set_value(r#"{"v":"old"}"#.to_string());
    let job = session.evaluate_now();
    session.apply(job.run().await);
    assert_eq!(session.panes.derived.value(), "old");

    session.panes.primary.set_value(r#"{"v":"new"}"#.to_string());
    let render = session.evaluate_now();
    let early_path = session.set_query("$.v").expect("path query over the shown output");

    let render_outcome = render.run().await;
    let early_outcome = early_path.run().await;
    assert!(session.apply(render_outcome));
    // Ran over the output that is no longer shown.
    assert!(!session.apply(early_outcome));
    assert_eq!(session.panes.output.value(), "{\n  \"v\": \"new\"\n}");

    let refresh = session.tick(0).expect("re-query after the render");
    session.apply(refresh.run().await);
    assert_eq!(session.panes.derived.value(), "new");
    assert_eq!(session.in_flight(), 0);
    assert!(session.tick(1).is_none());
}

#[tokio::test]
async fn test_render_failure_clears_path_source() {
    let backend = EchoBackend::new();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));
    session.panes.primary.set_value("not json at all".to_string());

    let job = session.evaluate_now();
    session.apply(job.run().await);

    assert!(session.panes.output.value().starts_with("// Template error\n"));
    assert_eq!(backend.count("jsonpath:"), 0);
    assert!(session.set_query("$.x").is_none());
}

#[tokio::test]
async fn test_invalid_data_never_reaches_the_backend() {
    let backend = EchoBackend::new();
    let mut session = jinja_session(backend.clone(), shared(MemoryStore::new()));
    session.panes.data.set_value("{not json".to_string());

    let job = session.evaluate_now();
    session.apply(job.run().await);

    assert!(session.panes.output.value().starts_with("// Input data error:\n"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_predicate_errors_are_listed() {
    let backend = EchoBackend::with_predicate_reply(PredicateResponse {
        ok: json!(false),
        errors: Some(json!(["bad token"])),
        ..Default::default()
    });
    let mut session = ToolSession::new(
        ToolKind::Predicate,
        &config(1000, 1000),
        shared(MemoryStore::new()),
        backend.clone(),
    );
    session.panes.primary.set_value("x >\n5".to_string());

    let job = session.evaluate_now();
    session.apply(job.run().await);

    assert_eq!(session.panes.output.value(), "// Predicate error\nbad token");
    assert_eq!(backend.calls(), vec!["predicate:x > 5".to_string()]);
    assert_eq!(session.panes.derived.value(), "");
}

#[tokio::test]
async fn test_predicate_success_shows_value() {
    let backend = EchoBackend::new();
    let mut session = ToolSession::new(
        ToolKind::Predicate,
        &config(1000, 1000),
        shared(MemoryStore::new()),
        backend.clone(),
    );

    assert_eq!(session.panes.primary.value(), "x > 5 and y < 30");
    let job = session.evaluate_now();
    session.apply(job.run().await);
    assert_eq!(session.panes.output.value(), "true");
    assert!(session.set_query("$.x").is_none());
}

#[test]
fn test_session_starts_from_stored_draft() {
    let mut store = MemoryStore::new();
    store.set("jinja2_template", "{{ saved }}").unwrap();
    store.set("jinja2_output_format", "text").unwrap();
    let session = ToolSession::new(ToolKind::Jinja, &config(1000, 1000), shared(store), EchoBackend::new());

    let example = Draft::example(ToolKind::Jinja);
    assert_eq!(session.panes.primary.value(), "{{ saved }}");
    assert_eq!(session.panes.data.value(), example.data);
    assert_eq!(session.query(), example.query);
    assert_eq!(session.format(), OutputFormat::Text);
}

#[test]
fn test_flush_writes_immediately() {
    let store = shared(MemoryStore::new());
    let mut session = ToolSession::new(ToolKind::Jinja, &config(1000, 1000), store.clone(), EchoBackend::new());

    session.panes.primary.edit("{{ closing }}");
    session.tick(0);
    assert!(stored(&store, "jinja2_template").is_none());

    session.flush();
    assert_eq!(stored(&store, "jinja2_template").as_deref(), Some("{{ closing }}"));
    assert!(!session.is_persist_pending());
}

#[tokio::test]
async fn test_presets_and_reset() {
    let backend = EchoBackend::new();
    let store = shared(MemoryStore::new());
    let mut session = ToolSession::new(ToolKind::Jinja, &config(1000, 1000), store.clone(), backend.clone());
    let example = Draft::example(ToolKind::Jinja);

    session.panes.primary.edit("{{ mine }}");
    assert_eq!(session.save_preset("  mine ").unwrap(), "mine");
    assert_eq!(session.preset_names(), vec!["mine".to_string()]);

    // Declined reset changes nothing.
    assert!(session.reset_to_examples(false).is_none());
    assert_eq!(session.panes.primary.value(), "{{ mine }}");

    session.flush();
    let job = session.reset_to_examples(true).expect("reset re-evaluates");
    assert_eq!(session.panes.primary.value(), example.primary);
    assert!(stored(&store, "jinja2_template").is_none());
    assert_eq!(session.preset_names(), vec!["mine".to_string()]);
    session.apply(job.run().await);

    let job = session.load_preset("mine").unwrap();
    assert_eq!(session.panes.primary.value(), "{{ mine }}");
    assert_eq!(stored(&store, "jinja2_template").as_deref(), Some("{{ mine }}"));
    session.apply(job.run().await);
    assert!(backend.calls().contains(&"render:{{ mine }}".to_string()));

    assert!(matches!(session.load_preset("missing"), Err(PresetError::NotFound(_))));
    assert!(matches!(session.delete_preset("mine", false), Err(PresetError::Cancelled)));
    session.delete_preset("mine", true).unwrap();
    assert!(session.preset_names().is_empty());
}
