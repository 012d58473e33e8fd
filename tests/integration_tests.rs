//! Integration tests for the toolwire server
//!
//! These tests drive the full server loop over in-memory input and an
//! in-memory output sink, checking what a client would observe on the wire.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_test::assert_ok;

use toolwire::config::Config;
use toolwire::error::TransportError;
use toolwire::mcp::{Dispatcher, McpServer, MessageHook, OutputSink, ServerHooks};
use toolwire::sample_tools;
use toolwire::tools::{ParamType, Parameter, ToolDefinition, ToolRegistry};

/// Helper to create a JSON-RPC request line
fn request(id: i64, method: &str, params: Option<Value>) -> String {
    let mut request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(p) = params {
        request["params"] = p;
    }
    format!("{request}\n")
}

fn call(id: i64, tool: &str, arguments: Value) -> String {
    request(id, "tools/call", Some(json!({"name": tool, "arguments": arguments})))
}

fn sample_dispatcher() -> Dispatcher {
    Dispatcher::new(Config::default(), sample_tools::registry().unwrap())
}

/// Run the server over `input` and return every output line as JSON
async fn run(dispatcher: Dispatcher, input: &str) -> Vec<Value> {
    let server = McpServer::new(dispatcher);
    let sink = OutputSink::new(Vec::<u8>::new());
    assert_ok!(server.serve(input.as_bytes(), sink.clone()).await);
    sink.contents()
        .await
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is one JSON value"))
        .collect()
}

fn by_id(responses: &[Value], id: i64) -> &Value {
    responses
        .iter()
        .find(|r| r["id"] == id)
        .unwrap_or_else(|| panic!("no response with id {id}"))
}

mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_then_initialized() {
        let input = request(
            1,
            "initialize",
            Some(json!({
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test-client", "version": "1.0.0"},
                "capabilities": {}
            })),
        );
        let out = run(sample_dispatcher(), &input).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 1);
        assert_eq!(out[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(out[0]["result"]["serverInfo"]["name"], "toolwire");
        assert_eq!(out[0]["result"]["capabilities"]["tools"]["listChanged"], true);
        assert_eq!(out[1]["method"], "notifications/initialized");
        assert!(out[1].get("id").is_none());
    }

    #[tokio::test]
    async fn test_slow_initializer_does_not_delay_response() {
        let dispatcher = sample_dispatcher().with_initializer(|_| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            anyhow::Ok(())
        });
        let out = run(dispatcher, &request(7, "initialize", None)).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 7);
        assert_eq!(out[1]["method"], "notifications/initialized");
    }

    #[tokio::test]
    async fn test_failed_initializer_drops_notification() {
        let dispatcher = sample_dispatcher()
            .with_initializer(|_| async { Err::<(), _>(anyhow::anyhow!("warm-up failed")) });
        let out = run(dispatcher, &request(1, "initialize", None)).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 1);
        assert!(out[0]["result"].is_object());
    }

    #[tokio::test]
    async fn test_initializer_receives_params() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let slot = Arc::clone(&seen);
        let dispatcher = sample_dispatcher().with_initializer(move |params| {
            *slot.lock().unwrap() = params;
            async { anyhow::Ok(()) }
        });
        run(dispatcher, &request(1, "initialize", Some(json!({"capabilities": {}})))).await;
        assert_eq!(*seen.lock().unwrap(), Some(json!({"capabilities": {}})));
    }

    #[tokio::test]
    async fn test_ping() {
        let out = run(sample_dispatcher(), &request(3, "ping", None)).await;
        assert_eq!(out, vec![json!({"jsonrpc": "2.0", "id": 3, "result": {}})]);
    }
}

mod tool_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_tools() {
        let out = run(sample_dispatcher(), &request(2, "tools/list", None)).await;
        let tools = out[0]["result"]["tools"].as_array().unwrap();
        let add = tools.iter().find(|t| t["name"] == "add").unwrap();

        assert_eq!(add["inputSchema"]["type"], "object");
        assert_eq!(add["inputSchema"]["required"], json!(["a", "b"]));
        assert_eq!(add["inputSchema"]["properties"]["a"]["type"], "number");
        assert!(add["description"].is_string());
    }

    #[tokio::test]
    async fn test_call_add() {
        let out = run(sample_dispatcher(), &call(4, "add", json!({"a": 1, "b": 2}))).await;
        let result = &out[0]["result"];
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"], json!([{"type": "text", "text": "3.0"}]));
    }

    #[tokio::test]
    async fn test_missing_argument_is_invalid_params() {
        let out = run(sample_dispatcher(), &call(5, "add", json!({"a": 1}))).await;
        let error = &out[0]["error"];
        assert_eq!(out[0]["id"], 5);
        assert_eq!(error["code"], -32602);
        assert_eq!(error["data"]["required-args"], json!(["a", "b"]));
        assert_eq!(error["data"]["provided-args"], json!(["a"]));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_tool_error() {
        let out = run(sample_dispatcher(), &call(6, "add", json!({"a": "x", "b": 2}))).await;
        let result = &out[0]["result"];
        assert!(out[0]["error"].is_null());
        assert_eq!(result["isError"], true);

        let content = result["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        let record: Value = serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(record, json!({"parameter": "a", "expected": "number", "got": "string"}));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let out = run(sample_dispatcher(), &call(8, "multiply", json!({}))).await;
        assert_eq!(out[0]["error"]["code"], -32602);
        assert_eq!(out[0]["error"]["data"]["cause"], "missing-tool");
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_loop() {
        let input = format!(
            "{}{}",
            call(1, "fail", json!({"reason": "boom"})),
            call(2, "echo", json!({"message": "still here"}))
        );
        let out = run(sample_dispatcher(), &input).await;

        assert_eq!(out.len(), 2);
        let failed = by_id(&out, 1);
        assert_eq!(failed["result"]["isError"], true);
        assert_eq!(failed["result"]["content"][0]["text"], "boom");
        let echoed = by_id(&out, 2);
        assert_eq!(echoed["result"]["content"][0]["text"], "still here");
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_loop() {
        let panicky = ToolDefinition::builder("panicky", "Panics")
            .handler(|_| -> anyhow::Result<Vec<Value>> { panic!("invariant broken") })
            .build()
            .unwrap();
        let registry = ToolRegistry::from_tools([panicky]).unwrap();
        let dispatcher = Dispatcher::new(Config::default(), registry);
        let input = format!("{}{}", call(1, "panicky", json!({})), request(2, "ping", None));
        let out = run(dispatcher, &input).await;

        assert_eq!(out.len(), 2);
        assert_eq!(by_id(&out, 1)["result"]["isError"], true);
        assert_eq!(by_id(&out, 2)["result"], json!({}));
    }
}

mod transport_tests {
    use super::*;

    fn slow_registry() -> ToolRegistry {
        let sleep = ToolDefinition::builder("sleep", "Sleep, then answer")
            .param(Parameter::required("ms", ParamType::Number, "Milliseconds"))
            .handler(|args| {
                let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
                std::thread::sleep(Duration::from_millis(ms));
                Ok(vec![json!(format!("slept {ms}ms"))])
            })
            .build()
            .unwrap();
        ToolRegistry::from_tools([sleep]).unwrap()
    }

    #[tokio::test]
    async fn test_notification_produces_no_output() {
        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
        let out = run(sample_dispatcher(), input).await;
        assert!(out.is_empty(), "notifications must not produce output");
    }

    #[tokio::test]
    async fn test_client_initialized_notification_recorded() {
        let server = McpServer::new(sample_dispatcher());
        let sink = OutputSink::new(Vec::<u8>::new());
        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
        assert_ok!(server.serve(input.as_bytes(), sink.clone()).await);
        assert!(server.dispatcher().is_initialized());
    }

    #[tokio::test]
    async fn test_garbage_yields_parse_error_and_loop_continues() {
        let input = format!("not json at all\n{}", request(9, "ping", None));
        let out = run(sample_dispatcher(), &input).await;

        assert_eq!(out.len(), 2);
        let parse_error = out.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(parse_error["error"]["code"], -32700);
        assert_eq!(by_id(&out, 9)["result"], json!({}));
    }

    #[tokio::test]
    async fn test_unrecognized_shape_ignored() {
        let input = "{\"jsonrpc\":\"2.0\",\"id\":4,\"result\":{}}\n[1,2,3]\n";
        let out = run(sample_dispatcher(), input).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_any_numeric_id_is_answered() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1.5,\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":18446744073709551615,\"method\":\"ping\"}\n",
        );
        let out = run(sample_dispatcher(), input).await;

        assert_eq!(out.len(), 2);
        let float = out.iter().find(|r| r["id"] == json!(1.5)).unwrap();
        assert_eq!(float["result"], json!({}));
        let big = out.iter().find(|r| r["id"] == json!(u64::MAX)).unwrap();
        assert_eq!(big["result"], json!({}));
    }

    #[tokio::test]
    async fn test_broken_request_envelope_is_invalid_request() {
        let input = concat!(
            "{\"jsonrpc\":2,\"id\":3,\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":true,\"method\":\"ping\"}\n",
        );
        let out = run(sample_dispatcher(), input).await;

        assert_eq!(out.len(), 2);
        assert_eq!(by_id(&out, 3)["error"]["code"], -32600);
        let unaddressable = out.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(unaddressable["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_read_failures_drain_in_flight_requests() {
        let first = call(1, "sleep", json!({"ms": 200}));
        let mut builder = tokio_test::io::Builder::new();
        builder.read(first.as_bytes());
        for _ in 0..16 {
            builder.read_error(std::io::Error::new(std::io::ErrorKind::Other, "device gone"));
        }
        let mock = builder.build();
        // The builder retains clones of the injected errors; drop it so the mock owns them.
        drop(builder);
        let reader = tokio::io::BufReader::new(mock);

        let server = McpServer::new(Dispatcher::new(Config::default(), slow_registry()));
        let sink = OutputSink::new(Vec::<u8>::new());
        let outcome = server.serve(reader, sink.clone()).await;
        assert!(matches!(
            outcome,
            Err(TransportError::TooManyReadFailures { count: 16 })
        ));

        let out: Vec<Value> = sink
            .contents()
            .await
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(out.len(), 16);
        assert_eq!(by_id(&out, 1)["result"]["content"][0]["text"], "slept 200ms");
        let parse_errors = out.iter().filter(|r| r["error"]["code"] == -32700).count();
        assert_eq!(parse_errors, 15);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let out = run(sample_dispatcher(), &request(10, "completion/complete", None)).await;
        assert_eq!(out[0]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_static_collections() {
        let input = format!(
            "{}{}",
            request(1, "prompts/list", None),
            request(2, "resources/list", None)
        );
        let out = run(sample_dispatcher(), &input).await;
        assert_eq!(by_id(&out, 1)["result"], json!({"prompts": []}));
        assert_eq!(by_id(&out, 2)["result"], json!({"resources": []}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_complete_out_of_order() {
        let dispatcher = Dispatcher::new(Config::default(), slow_registry());
        let input = format!(
            "{}{}",
            call(1, "sleep", json!({"ms": 300})),
            call(2, "sleep", json!({"ms": 0}))
        );
        let out = run(dispatcher, &input).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 2);
        assert_eq!(out[1]["id"], 1);
        assert_eq!(by_id(&out, 1)["result"]["content"][0]["text"], "slept 300ms");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_responses_never_interleave() {
        let dispatcher = Dispatcher::new(Config::default(), slow_registry());
        let input: String = (0..64)
            .map(|id| call(id, "sleep", json!({"ms": id % 5})))
            .collect();
        let out = run(dispatcher, &input).await;

        assert_eq!(out.len(), 64);
        let ids: HashSet<i64> = out.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, (0..64).collect());
    }

    #[tokio::test]
    async fn test_hooks_observe_traffic() {
        let received = Arc::new(AtomicUsize::new(0));
        let sent = Arc::new(AtomicUsize::new(0));
        let on_receive: MessageHook = {
            let received = Arc::clone(&received);
            Arc::new(move |_: &Value| {
                received.fetch_add(1, Ordering::SeqCst);
            })
        };
        let on_send: MessageHook = {
            let sent = Arc::clone(&sent);
            Arc::new(move |_: &Value| {
                sent.fetch_add(1, Ordering::SeqCst);
            })
        };
        let hooks = ServerHooks {
            on_receive: Some(on_receive),
            on_send: Some(on_send),
        };
        let dispatcher = sample_dispatcher().with_hooks(hooks);
        let input = format!(
            "{}{}",
            request(1, "ping", None),
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n"
        );
        run(dispatcher, &input).await;

        assert_eq!(received.load(Ordering::SeqCst), 2);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }
}
