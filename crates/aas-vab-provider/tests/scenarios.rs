use aas_vab_core::element::{
    collection, delegated_property, operation, property, submodel, typed_property, variable,
};
use aas_vab_core::{
    ElementProxy, ErrorKind, InvokeResult, MemoryStore, Path, VabError, VabResult, ValueType,
};
use aas_vab_provider::{ElementProvider, ProviderConfig, SubmodelProvider};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_test::{assert_err, assert_ok};

fn sample_submodel() -> Value {
    submodel(
        "operationalData",
        vec![
            collection(
                "containerRoot",
                vec![collection(
                    "container",
                    vec![
                        typed_property("integerProperty", json!(123), ValueType::Int),
                        operation(
                            "nestedOp",
                            vec![],
                            vec![variable("result", ValueType::String)],
                        ),
                    ],
                )],
            ),
            collection(
                "root",
                vec![typed_property("count", json!(123), ValueType::Int)],
            ),
            operation(
                "sub",
                vec![variable("x", ValueType::Int), variable("y", ValueType::Int)],
                vec![variable("result", ValueType::Int)],
            ),
            operation(
                "add",
                vec![variable("a", ValueType::Int), variable("b", ValueType::Int)],
                vec![variable("sum", ValueType::Int)],
            ),
            operation("fail", vec![], vec![]),
            operation("explode", vec![], vec![]),
            operation("gate", vec![], vec![variable("opened", ValueType::Boolean)]),
            json!({
                "idShort": "delegated",
                "modelType": "Operation",
                "inputVariables": [],
                "outputVariables": [],
                "invokable": {}
            }),
        ],
    )
}

fn int(args: &[Value], index: usize) -> VabResult<i64> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| VabError::malformed(format!("argument {index} must be an integer")))
}

struct Fixture {
    store: Arc<MemoryStore>,
    provider: SubmodelProvider,
    gate: mpsc::Sender<()>,
}

fn fixture_with(config: &ProviderConfig) -> Fixture {
    let store = Arc::new(MemoryStore::with_submodel(&sample_submodel()).unwrap());

    store
        .bind_function("submodelElements/sub", |args| Ok(json!(int(args, 0)? - int(args, 1)?)))
        .unwrap();
    store
        .bind_function("submodelElements/add", |args| Ok(json!(int(args, 0)? + int(args, 1)?)))
        .unwrap();
    store
        .bind_function("submodelElements/fail", |_| Err(VabError::provider("sensor offline")))
        .unwrap();
    store
        .bind_function("submodelElements/explode", |_| panic!("bound behavior crashed"))
        .unwrap();
    store
        .bind_function("submodelElements/delegated/invokable", |_| Ok(json!("delegated")))
        .unwrap();
    store
        .bind_function(
            "submodelElements/containerRoot/value/container/value/nestedOp",
            |_| Ok(json!("nested")),
        )
        .unwrap();

    let (gate, opened) = mpsc::channel::<()>();
    let opened = Mutex::new(opened);
    store
        .bind_function("submodelElements/gate", move |_| {
            opened
                .lock()
                .recv_timeout(Duration::from_secs(5))
                .map_err(|e| VabError::provider(e.to_string()))?;
            Ok(json!(true))
        })
        .unwrap();

    let provider = SubmodelProvider::with_config(store.clone(), Handle::current(), config);
    Fixture {
        store,
        provider,
        gate,
    }
}

fn fixture() -> Fixture {
    fixture_with(&ProviderConfig::default())
}

fn kind<T: std::fmt::Debug>(result: VabResult<T>) -> ErrorKind {
    result.unwrap_err().kind()
}

fn accepted(result: InvokeResult) -> String {
    match result {
        InvokeResult::Accepted(ack) => ack.request_id,
        other => panic!("expected acknowledgement, got {other:?}"),
    }
}

async fn poll_until_done(provider: &SubmodelProvider, path: &str) -> Value {
    for _ in 0..300 {
        let response = provider.read(path).unwrap();
        let state = response["executionState"].as_str().unwrap_or_default();
        if state != "INITIATED" && state != "RUNNING" {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("invocation at {path} did not finish");
}

#[tokio::test]
async fn scenario_a_property_write_then_read() {
    let f = fixture();
    assert_ok!(f
        .provider
        .write("submodel/submodelElements/root/count/value", json!(42)));

    assert_eq!(
        f.provider
            .read("submodel/submodelElements/root/count/value")
            .unwrap(),
        json!(42)
    );
    let payload = f.provider.read("submodel/submodelElements/root/count").unwrap();
    assert_eq!(payload["value"], json!(42));
    assert_eq!(payload["valueType"], json!("int"));
    assert_eq!(payload["idShort"], json!("count"));
}

#[tokio::test]
async fn property_value_roundtrip_rederives_type() {
    let f = fixture();
    let path = "submodel/submodelElements/containerRoot/container/integerProperty/value";
    for (value, value_type) in [
        (json!(true), "boolean"),
        (json!("hello"), "string"),
        (json!(1.25), "double"),
        (json!(9_000_000_000_i64), "long"),
    ] {
        f.provider.write(path, value.clone()).unwrap();
        assert_eq!(f.provider.read(path).unwrap(), value);
        let payload = f
            .provider
            .read("submodel/submodelElements/containerRoot/container/integerProperty")
            .unwrap();
        assert_eq!(payload["valueType"], json!(value_type));
    }
}

#[tokio::test]
async fn byte_stream_write_keeps_value_type() {
    let f = fixture();
    f.provider
        .write("submodel/submodelElements/root/count/value", b"raw upload".to_vec())
        .unwrap();
    let payload = f.provider.read("submodel/submodelElements/root/count").unwrap();
    assert_eq!(payload["valueType"], json!("int"));
    assert!(payload["value"].is_string());
}

#[tokio::test]
async fn written_delegate_object_stays_plain_data() {
    let f = fixture();
    let path = "submodel/submodelElements/root/count/value";
    let payload = json!({"delegate": ""});

    f.provider.write(path, payload.clone()).unwrap();
    assert_eq!(f.provider.read(path).unwrap(), payload);
    let count = f.provider.read("submodel/submodelElements/root/count").unwrap();
    assert_eq!(count["valueType"], json!("anyType"));

    f.provider.write(path, json!(5)).unwrap();
    assert_eq!(f.provider.read(path).unwrap(), json!(5));
    let submodel = f.provider.read("submodel").unwrap();
    assert_eq!(submodel["idShort"], json!("operationalData"));
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/containerRoot/container/integerProperty/value")
            .unwrap(),
        json!(123)
    );
}

#[tokio::test]
async fn delegated_property_forwards_to_its_target() {
    let f = fixture();
    f.provider
        .create(
            "submodel/submodelElements",
            delegated_property("mirror", "submodelElements/root/value/count/value", ValueType::Int),
        )
        .unwrap();

    assert_eq!(
        f.provider.read("submodel/submodelElements/mirror/value").unwrap(),
        json!(123)
    );
    f.provider
        .write("submodel/submodelElements/mirror/value", json!(9))
        .unwrap();
    assert_eq!(
        f.provider.read("submodel/submodelElements/root/count/value").unwrap(),
        json!(9)
    );
}

#[tokio::test]
async fn delegate_to_ancestor_is_refused() {
    let f = fixture();
    for (id_short, target) in [("up", "submodelElements"), ("top", "")] {
        f.provider
            .create(
                "submodel/submodelElements",
                delegated_property(id_short, target, ValueType::Int),
            )
            .unwrap();
        let path = format!("submodel/submodelElements/{id_short}/value");
        assert_eq!(kind(f.provider.write(&path, json!(1))), ErrorKind::MalformedRequest);
        assert_eq!(kind(f.provider.read(&path)), ErrorKind::MalformedRequest);
    }

    let submodel = f.provider.read("submodel").unwrap();
    assert_eq!(submodel["idShort"], json!("operationalData"));
    assert_eq!(
        f.provider.read("submodel/submodelElements/root/count/value").unwrap(),
        json!(123)
    );
}

#[tokio::test]
async fn recursive_shape_matches_direct_value() {
    let f = fixture();
    let structural = f
        .provider
        .read("submodel/submodelElements/containerRoot")
        .unwrap();

    let container = &structural["value"][0];
    assert_eq!(container["idShort"], json!("container"));
    let prop = container["value"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["idShort"] == json!("integerProperty"))
        .unwrap();

    let direct = f
        .provider
        .read("submodel/submodelElements/containerRoot/container/integerProperty/value")
        .unwrap();
    assert_eq!(prop["value"], direct);
    assert_eq!(direct, json!(123));
}

#[tokio::test]
async fn create_is_idempotent_by_key() {
    let f = fixture();
    f.provider
        .create("submodel/submodelElements/root/extra", property("extra", json!(1)))
        .unwrap();
    f.provider
        .create("submodel/submodelElements/root/extra", property("extra", json!("two")))
        .unwrap();

    let root = f.provider.read("submodel/submodelElements/root").unwrap();
    let children = root["value"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["idShort"], json!("count"));
    assert_eq!(children[1]["idShort"], json!("extra"));
    assert_eq!(children[1]["value"], json!("two"));
}

#[tokio::test]
async fn create_at_element_list_uses_own_id_short() {
    let f = fixture();
    f.provider
        .create("submodel/submodelElements", property("status", json!("ok")))
        .unwrap();
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/status/value")
            .unwrap(),
        json!("ok")
    );

    f.provider
        .create(
            "submodel/submodelElements/containerRoot/container/fresh",
            property("ignored", json!(5)),
        )
        .unwrap();
    let fresh = f
        .provider
        .read("submodel/submodelElements/containerRoot/container/fresh")
        .unwrap();
    assert_eq!(fresh["idShort"], json!("fresh"));
}

#[tokio::test]
async fn reserved_value_id_short_is_rejected() {
    let f = fixture();
    let err = f
        .provider
        .create("submodel/submodelElements/root/value", property("value", json!(1)));
    assert_eq!(kind(err), ErrorKind::MalformedRequest);

    let nested = collection("bad", vec![property("value", json!(1))]);
    let err = f.provider.create("submodel/submodelElements/bad", nested);
    assert_eq!(kind(err), ErrorKind::MalformedRequest);
}

#[tokio::test]
async fn writing_a_bare_child_is_malformed() {
    let f = fixture();
    let err = f.provider.write(
        "submodel/submodelElements/root/count",
        property("count", json!(1)),
    );
    assert_eq!(kind(err), ErrorKind::MalformedRequest);
}

#[tokio::test]
async fn collection_children_can_be_replaced_wholesale() {
    let f = fixture();
    f.provider
        .write(
            "submodel/submodelElements/root/value",
            json!([property("a", json!(1)), property("b", json!(2))]),
        )
        .unwrap();
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/root/value")
            .unwrap(),
        json!({"a": 1, "b": 2})
    );
    let err = f.provider.read("submodel/submodelElements/root/count");
    assert_eq!(kind(err), ErrorKind::ResourceNotFound);
}

#[tokio::test]
async fn node_kind_is_decided_per_access() {
    let f = fixture();
    f.provider
        .create(
            "submodel/submodelElements/root/count",
            collection("count", vec![property("inner", json!(7))]),
        )
        .unwrap();
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/root/count/value")
            .unwrap(),
        json!({"inner": 7})
    );
}

#[tokio::test]
async fn plain_elements_pass_through() {
    let f = fixture();
    f.provider
        .create(
            "submodel/submodelElements/manual",
            json!({
                "idShort": "manual",
                "modelType": "File",
                "contentType": "application/pdf",
                "value": "manual.pdf"
            }),
        )
        .unwrap();
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/manual/contentType")
            .unwrap(),
        json!("application/pdf")
    );
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/manual/value")
            .unwrap(),
        json!("manual.pdf")
    );
    assert_eq!(
        f.provider.read("submodel/values").unwrap()["manual"],
        json!("manual.pdf")
    );
}

#[tokio::test]
async fn value_view_flattens_recursively() {
    let f = fixture();
    assert_eq!(
        f.provider.read("submodel/values").unwrap(),
        json!({
            "containerRoot": {"container": {"integerProperty": 123}},
            "root": {"count": 123}
        })
    );
}

#[tokio::test]
async fn element_list_holds_direct_children() {
    let f = fixture();
    let elements = f.provider.read("submodel/submodelElements").unwrap();
    let ids: Vec<&str> = elements
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["idShort"].as_str())
        .collect();
    assert_eq!(
        ids,
        ["containerRoot", "root", "sub", "add", "fail", "explode", "gate", "delegated"]
    );
}

#[tokio::test]
async fn scenario_d_delete_nested_collection() {
    let f = fixture();
    f.provider
        .delete("submodel/submodelElements/containerRoot/container")
        .unwrap();

    let err = f
        .provider
        .read("submodel/submodelElements/containerRoot/container/integerProperty/value");
    assert_eq!(kind(err), ErrorKind::ResourceNotFound);

    let root = f
        .provider
        .read("submodel/submodelElements/containerRoot")
        .unwrap();
    assert_eq!(root["value"], json!([]));
    assert_eq!(
        f.provider
            .read("submodel/submodelElements/containerRoot/value")
            .unwrap(),
        json!({})
    );
    // The nested operation went with its collection
    assert!(!f
        .store
        .has_function("submodelElements/containerRoot/value/container/value/nestedOp"));
}

#[tokio::test]
async fn delete_errors() {
    let f = fixture();
    assert_eq!(
        kind(f.provider.delete("submodel/submodelElements/root/missing")),
        ErrorKind::ResourceNotFound
    );
    assert_eq!(
        kind(f.provider.delete("submodel/submodelElements/root/count/value")),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.delete("submodel/submodelElements/root/value")),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.delete("submodel/submodelElements")),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.delete_value("submodel/submodelElements/root", &json!(1))),
        ErrorKind::MalformedRequest
    );
}

#[tokio::test]
async fn scenario_e_slash_variations_address_the_same_tree() {
    let f = fixture();
    let canonical = f.provider.read("").unwrap();
    for path in ["submodel", "/submodel/", "//submodel//", "/"] {
        assert_eq!(f.provider.read(path).unwrap(), canonical, "path {path:?}");
    }
    assert_eq!(canonical, sample_submodel());
    assert_eq!(
        f.provider.read("/submodel//values/").unwrap(),
        f.provider.read("submodel/values").unwrap()
    );
}

#[tokio::test]
async fn root_grammar_is_enforced() {
    let f = fixture();
    assert_eq!(kind(f.provider.read("other")), ErrorKind::MalformedRequest);
    assert_eq!(kind(f.provider.read("submodel/unknown")), ErrorKind::MalformedRequest);
    assert_eq!(kind(f.provider.write("", json!(1))), ErrorKind::MalformedRequest);
    assert_eq!(
        kind(f.provider.write("submodel/submodelElements", json!([]))),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.create("submodel", property("x", json!(1)))),
        ErrorKind::MalformedRequest
    );
    assert_eq!(kind(f.provider.delete("")), ErrorKind::MalformedRequest);
    assert_eq!(
        kind(f.provider.invoke("submodel/values", &[])),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.read("submodel/submodelElements/missing")),
        ErrorKind::ResourceNotFound
    );
}

#[tokio::test]
async fn errors_keep_their_kind_with_path_context() {
    let f = fixture();
    let err = f
        .provider
        .read("submodel/submodelElements/root/missing")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert!(err.message().starts_with("submodelElements/root/missing"));
}

#[tokio::test]
async fn verbs_inapplicable_to_kind_are_malformed() {
    let f = fixture();
    assert_eq!(
        kind(f.provider.read("submodel/submodelElements/sub/value")),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.write("submodel/submodelElements/sub/value", json!(1))),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.invoke("submodel/submodelElements/root/count/invoke", &[])),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.invoke("submodel/submodelElements/root", &[])),
        ErrorKind::MalformedRequest
    );
    assert_eq!(
        kind(f.provider.read("submodel/submodelElements/root/count/unit")),
        ErrorKind::MalformedRequest
    );
}

#[tokio::test]
async fn operation_declaration_is_readable() {
    let f = fixture();
    let sub = f.provider.read("submodel/submodelElements/sub").unwrap();
    assert_eq!(sub["inputVariables"].as_array().unwrap().len(), 2);

    let delegated = f.provider.read("submodel/submodelElements/delegated").unwrap();
    assert!(delegated.get("invokable").is_none());
}

#[tokio::test]
async fn scenario_b_direct_sync_invocation() {
    let f = fixture();
    let result = f
        .provider
        .invoke("submodel/submodelElements/sub/invoke", &[json!(10), json!(6)])
        .unwrap();
    assert_eq!(result, InvokeResult::Raw(json!(4)));

    // Wrapped scalar arguments are unwrapped
    let result = f
        .provider
        .invoke(
            "submodel/submodelElements/sub",
            &[
                json!({"valueType": "int", "value": 10}),
                json!({"valueType": "int", "value": 6}),
            ],
        )
        .unwrap();
    assert_eq!(result, InvokeResult::Raw(json!(4)));
}

#[tokio::test]
async fn wrapped_sync_invocation_returns_response() {
    let f = fixture();
    let request = json!({
        "requestId": "w1",
        "inputArguments": [
            {"idShort": "x", "value": 10, "valueType": "int"},
            {"idShort": "y", "value": 6, "valueType": "int"}
        ]
    });
    let InvokeResult::Response(response) = f
        .provider
        .invoke("submodel/submodelElements/sub/invoke", &[request])
        .unwrap()
    else {
        panic!("expected a full response");
    };
    assert_eq!(response.request_id, "w1");
    assert_eq!(response.execution_state.to_string(), "COMPLETED");
    assert_eq!(response.output_arguments.len(), 1);
    assert_eq!(response.output_arguments[0].id_short, "result");
    assert_eq!(response.output_arguments[0].value, json!(4));
    assert_eq!(response.input_arguments.len(), 2);
}

#[tokio::test]
async fn wrapped_outputs_follow_declared_variables() {
    let f = fixture();
    let request = json!({
        "inputArguments": [
            {"idShort": "x", "value": 10},
            {"idShort": "y", "value": 6}
        ],
        "outputArgumentsTemplate": [{"idShort": "other", "valueType": "string"}]
    });
    let InvokeResult::Response(response) = f
        .provider
        .invoke("submodel/submodelElements/sub/invoke", &[request])
        .unwrap()
    else {
        panic!("expected a full response");
    };
    assert_eq!(response.output_arguments.len(), 1);
    assert_eq!(response.output_arguments[0].id_short, "result");
    assert_eq!(response.output_arguments[0].value, json!(4));
}

#[tokio::test]
async fn wrapped_arguments_are_reordered_by_name() {
    let f = fixture();
    let direct = f
        .provider
        .invoke("submodel/submodelElements/sub/invoke", &[json!(10), json!(6)])
        .unwrap();

    let swapped = json!({
        "inputArguments": [
            {"idShort": "y", "value": 6},
            {"idShort": "x", "value": 10}
        ]
    });
    let InvokeResult::Response(response) = f
        .provider
        .invoke("submodel/submodelElements/sub/invoke", &[swapped])
        .unwrap()
    else {
        panic!("expected a full response");
    };
    assert_eq!(InvokeResult::Raw(response.output_arguments[0].value.clone()), direct);
    assert!(!response.request_id.is_empty());
}

#[tokio::test]
async fn argument_mismatch_is_malformed() {
    let f = fixture();
    assert_eq!(
        kind(f.provider.invoke("submodel/submodelElements/sub/invoke", &[json!(10)])),
        ErrorKind::MalformedRequest
    );

    let renamed = json!({
        "inputArguments": [
            {"idShort": "x", "value": 10},
            {"idShort": "z", "value": 6}
        ]
    });
    assert_eq!(
        kind(f.provider.invoke("submodel/submodelElements/sub/invoke", &[renamed])),
        ErrorKind::MalformedRequest
    );

    let short = json!({"inputArguments": [{"idShort": "x", "value": 10}]});
    assert_eq!(
        kind(f.provider.invoke("submodel/submodelElements/sub/invoke", &[short])),
        ErrorKind::MalformedRequest
    );

    assert_eq!(
        kind(f.provider.invoke("submodel/submodelElements/sub/run", &[json!(1), json!(2)])),
        ErrorKind::MalformedRequest
    );
}

#[tokio::test]
async fn delegate_invokable_is_called() {
    let f = fixture();
    let result = f
        .provider
        .invoke("submodel/submodelElements/delegated/invoke", &[])
        .unwrap();
    assert_eq!(result, InvokeResult::Raw(json!("delegated")));
}

#[tokio::test]
async fn nested_operations_are_reachable() {
    let f = fixture();
    let result = f
        .provider
        .invoke(
            "submodel/submodelElements/containerRoot/container/nestedOp/invoke",
            &[],
        )
        .unwrap();
    assert_eq!(result, InvokeResult::Raw(json!("nested")));
}

#[tokio::test]
async fn sync_failures_are_provider_errors() {
    let f = fixture();
    let err = f
        .provider
        .invoke("submodel/submodelElements/fail/invoke", &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderFailure);
    assert!(err.message().contains("sensor offline"));

    let err = f
        .provider
        .invoke("submodel/submodelElements/explode/invoke", &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderFailure);
    assert!(err.message().contains("bound behavior crashed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_c_async_invocation_is_read_once() {
    let f = fixture();
    let request_id = accepted(
        f.provider
            .invoke(
                "submodel/submodelElements/sub/invoke?async=true",
                &[json!(10), json!(6)],
            )
            .unwrap(),
    );
    assert!(!request_id.is_empty());

    let poll = format!("submodel/submodelElements/sub/invocationList/{request_id}");
    let response = poll_until_done(&f.provider, &poll).await;
    assert_eq!(response["executionState"], json!("COMPLETED"));
    assert_eq!(response["requestId"], json!(request_id));
    let outputs = response["outputArguments"].as_array().unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0]["idShort"], json!("result"));
    assert_eq!(outputs[0]["value"], json!(4));

    assert_eq!(kind(f.provider.read(&poll)), ErrorKind::ResourceNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pending_invocation_can_be_polled_repeatedly() {
    let f = fixture();
    let request_id = accepted(
        f.provider
            .invoke("submodel/submodelElements/gate/invoke?async=true", &[])
            .unwrap(),
    );
    let poll = format!("submodel/submodelElements/gate/invocationList/{request_id}");

    for _ in 0..3 {
        let pending = f.provider.read(&poll).unwrap();
        let state = pending["executionState"].as_str().unwrap();
        assert!(state == "INITIATED" || state == "RUNNING", "state {state}");
    }

    f.gate.send(()).unwrap();
    let response = poll_until_done(&f.provider, &poll).await;
    assert_eq!(response["executionState"], json!("COMPLETED"));
    assert_eq!(response["outputArguments"][0]["value"], json!(true));
    assert_eq!(kind(f.provider.read(&poll)), ErrorKind::ResourceNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_async_calls_keep_their_own_results() {
    let f = fixture();
    f.provider
        .create(
            "submodel/submodelElements",
            operation(
                "echo",
                vec![variable("x", ValueType::Int)],
                vec![variable("echo", ValueType::Int)],
            ),
        )
        .unwrap();
    f.store
        .bind_function("submodelElements/echo", |args| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(json!(int(args, 0)?))
        })
        .unwrap();

    let calls: Vec<(i64, String)> = (0..8)
        .map(|x| {
            let request_id = accepted(
                f.provider
                    .invoke("submodel/submodelElements/echo/invoke?async=true", &[json!(x)])
                    .unwrap(),
            );
            (x, request_id)
        })
        .collect();

    let mut ids: Vec<&str> = calls.iter().map(|(_, id)| id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), calls.len());

    for (x, request_id) in &calls {
        let poll = format!("submodel/submodelElements/echo/invocationList/{request_id}");
        let response = poll_until_done(&f.provider, &poll).await;
        assert_eq!(response["executionState"], json!("COMPLETED"));
        assert_eq!(response["requestId"], json!(request_id));
        assert_eq!(response["inputArguments"][0]["value"], json!(x));
        assert_eq!(response["outputArguments"][0]["idShort"], json!("echo"));
        assert_eq!(response["outputArguments"][0]["value"], json!(x));
        assert_eq!(kind(f.provider.read(&poll)), ErrorKind::ResourceNotFound);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_results_are_scoped_to_their_operation() {
    let f = fixture();
    let request_id = accepted(
        f.provider
            .invoke(
                "submodel/submodelElements/sub/invoke?async=true",
                &[json!(3), json!(1)],
            )
            .unwrap(),
    );

    let foreign = format!("submodel/submodelElements/add/invocationList/{request_id}");
    assert_eq!(kind(f.provider.read(&foreign)), ErrorKind::ResourceNotFound);

    // Polling through the operation handler itself is scoped the same way
    let registry = Arc::clone(f.provider.registry());
    let add = ElementProvider::open(
        ElementProxy::new(f.store.clone(), Path::parse("submodelElements/add").unwrap()),
        Path::parse("add").unwrap(),
        Arc::clone(&registry),
    )
    .unwrap();
    let tail = Path::parse(&format!("invocationList/{request_id}")).unwrap();
    assert_eq!(kind(add.get(&tail)), ErrorKind::ResourceNotFound);

    let sub = ElementProvider::open(
        ElementProxy::new(f.store.clone(), Path::parse("submodelElements/sub").unwrap()),
        Path::parse("sub").unwrap(),
        registry,
    )
    .unwrap();
    let mut response = sub.get(&tail).unwrap();
    for _ in 0..300 {
        if response["executionState"] == json!("COMPLETED") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        response = sub.get(&tail).unwrap();
    }
    assert_eq!(response["outputArguments"][0]["value"], json!(2));
    assert_eq!(kind(sub.get(&tail)), ErrorKind::ResourceNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wrapped_async_request_keeps_caller_id() {
    let f = fixture();
    let request = json!({
        "requestId": "custom-1",
        "inputArguments": [
            {"idShort": "b", "value": 2},
            {"idShort": "a", "value": 40}
        ]
    });
    let request_id = accepted(
        f.provider
            .invoke("submodel/submodelElements/add/invoke?async=true", &[request])
            .unwrap(),
    );
    assert_eq!(request_id, "custom-1");

    let response = poll_until_done(
        &f.provider,
        "submodel/submodelElements/add/invocationList/custom-1",
    )
    .await;
    assert_eq!(response["outputArguments"][0]["idShort"], json!("sum"));
    assert_eq!(response["outputArguments"][0]["value"], json!(42));
    assert_eq!(response["inputArguments"][0]["idShort"], json!("b"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_pending_request_id_is_rejected() {
    let f = fixture();
    let request = json!({"requestId": "same", "inputArguments": []});
    assert_ok!(f
        .provider
        .invoke("submodel/submodelElements/gate/invoke?async=true", &[request.clone()]));
    let err = assert_err!(f
        .provider
        .invoke("submodel/submodelElements/gate/invoke?async=true", &[request]));
    assert_eq!(err.kind(), ErrorKind::ResourceAlreadyExists);

    f.gate.send(()).unwrap();
    poll_until_done(&f.provider, "submodel/submodelElements/gate/invocationList/same").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_failures_are_recorded_once() {
    let f = fixture();
    for op in ["fail", "explode"] {
        let request_id = accepted(
            f.provider
                .invoke(&format!("submodel/submodelElements/{op}/invoke?async=true"), &[])
                .unwrap(),
        );
        let poll = format!("submodel/submodelElements/{op}/invocationList/{request_id}");
        let response = poll_until_done(&f.provider, &poll).await;
        assert_eq!(response["executionState"], json!("FAILED"));
        assert!(response["message"].is_string());
        assert_eq!(kind(f.provider.read(&poll)), ErrorKind::ResourceNotFound);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_timeout_wins_over_late_completion() {
    let f = fixture_with(&ProviderConfig::default().with_async_timeout(Duration::from_millis(50)));
    let request_id = accepted(
        f.provider
            .invoke("submodel/submodelElements/gate/invoke?async=true", &[])
            .unwrap(),
    );
    let poll = format!("submodel/submodelElements/gate/invocationList/{request_id}");

    let response = poll_until_done(&f.provider, &poll).await;
    assert_eq!(response["executionState"], json!("TIMEOUT"));

    // Completing afterwards neither resurrects nor overwrites the record
    f.gate.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(kind(f.provider.read(&poll)), ErrorKind::ResourceNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_async_operation_is_polled_by_full_path() {
    let f = fixture();
    let request_id = accepted(
        f.provider
            .invoke(
                "submodel/submodelElements/containerRoot/container/nestedOp/invoke?async=true",
                &[],
            )
            .unwrap(),
    );

    let shallow = format!("submodel/submodelElements/nestedOp/invocationList/{request_id}");
    assert_eq!(kind(f.provider.read(&shallow)), ErrorKind::ResourceNotFound);

    let poll = format!(
        "submodel/submodelElements/containerRoot/container/nestedOp/invocationList/{request_id}"
    );
    let response = poll_until_done(&f.provider, &poll).await;
    assert_eq!(response["outputArguments"][0]["value"], json!("nested"));
}
