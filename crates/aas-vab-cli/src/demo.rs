//! Built-in demo submodel and walkthrough.

use crate::session::report;
use aas_vab_core::element::{collection, operation, submodel, typed_property, variable};
use aas_vab_core::{ExecutionState, InvokeResult, MemoryStore, VabError, VabResult, ValueType};
use aas_vab_provider::SubmodelProvider;
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;

const COUNT_VALUE: &str = "submodel/submodelElements/root/count/value";
const SUB: &str = "submodel/submodelElements/sub/invoke";
const SLOW_ADD: &str = "submodel/submodelElements/slowAdd";
const CONTAINER: &str = "submodel/submodelElements/containerRoot/container";

/// The demo submodel in the external representation.
pub fn sample_submodel() -> Value {
    submodel(
        "demo",
        vec![
            collection(
                "containerRoot",
                vec![collection(
                    "container",
                    vec![typed_property("integerProperty", json!(123), ValueType::Int)],
                )],
            ),
            collection(
                "root",
                vec![typed_property("count", json!(0), ValueType::Int)],
            ),
            operation(
                "sub",
                vec![variable("x", ValueType::Int), variable("y", ValueType::Int)],
                vec![variable("result", ValueType::Int)],
            ),
            operation(
                "slowAdd",
                vec![variable("a", ValueType::Int), variable("b", ValueType::Int)],
                vec![variable("sum", ValueType::Int)],
            ),
        ],
    )
}

fn int(args: &[Value], index: usize) -> VabResult<i64> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| VabError::malformed(format!("argument {index} must be an integer")))
}

/// A store holding the demo submodel with its operations bound.
///
/// # Errors
///
/// Propagates store errors.
pub fn store() -> VabResult<MemoryStore> {
    let store = MemoryStore::with_submodel(&sample_submodel())?;
    store.bind_function("submodelElements/sub", |args| {
        Ok(json!(int(args, 0)? - int(args, 1)?))
    })?;
    store.bind_function("submodelElements/slowAdd", |args| {
        std::thread::sleep(Duration::from_millis(200));
        Ok(json!(int(args, 0)? + int(args, 1)?))
    })?;
    Ok(store)
}

fn step(out: &mut impl Write, command: &str, outcome: VabResult<Value>) -> Result<()> {
    writeln!(out, "{}", report(command, outcome))?;
    Ok(())
}

fn is_terminal(response: &Value) -> bool {
    serde_json::from_value::<ExecutionState>(response["executionState"].clone())
        .is_ok_and(|state| state.is_terminal())
}

/// Walk through a property round-trip, a sync and an async invocation and a
/// nested delete on `provider`, which must serve the demo submodel.
///
/// # Errors
///
/// Returns error if the provider does not behave as the walkthrough expects.
pub async fn run(provider: &SubmodelProvider, out: &mut impl Write) -> Result<()> {
    step(
        out,
        &format!("write {COUNT_VALUE} 42"),
        provider.write(COUNT_VALUE, json!(42)).map(|()| Value::Null),
    )?;
    step(out, &format!("read {COUNT_VALUE}"), provider.read(COUNT_VALUE))?;

    step(
        out,
        &format!("invoke {SUB} 10 6"),
        provider
            .invoke(SUB, &[json!(10), json!(6)])
            .and_then(InvokeResult::into_value),
    )?;

    let invoke = format!("{SLOW_ADD}/invoke?async=true");
    let InvokeResult::Accepted(ack) = provider.invoke(&invoke, &[json!(20), json!(22)])? else {
        bail!("Asynchronous invocation was not accepted");
    };
    step(
        out,
        &format!("invoke {invoke} 20 22"),
        InvokeResult::Accepted(ack.clone()).into_value(),
    )?;

    let poll = format!("{SLOW_ADD}/invocationList/{}", ack.request_id);
    let response = loop {
        let response = provider.read(&poll)?;
        if is_terminal(&response) {
            break response;
        }
        tracing::debug!(request_id = %ack.request_id, "Waiting for invocation");
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    step(out, &format!("read {poll}"), Ok(response))?;
    step(out, &format!("read {poll}"), provider.read(&poll))?;

    step(
        out,
        &format!("delete {CONTAINER}"),
        provider.delete(CONTAINER).map(|()| Value::Null),
    )?;
    let nested = format!("{CONTAINER}/integerProperty/value");
    step(out, &format!("read {nested}"), provider.read(&nested))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliConfig;
    use crate::session::Session;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn walkthrough() {
        let session = Session::new(Arc::new(store().unwrap()), &CliConfig::default());
        let mut out = Vec::new();
        run(session.provider(), &mut out).await.unwrap();

        let reports: Vec<Value> = std::str::from_utf8(&out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(reports.len(), 8);
        assert_eq!(reports[1]["result"], json!(42));
        assert_eq!(reports[2]["result"], json!(4));
        assert!(reports[3]["result"]["requestId"].is_string());
        assert_eq!(reports[4]["result"]["executionState"], json!("COMPLETED"));
        assert_eq!(reports[4]["result"]["outputArguments"][0]["value"], json!(42));
        assert_eq!(reports[5]["error"], json!("resourceNotFound"));
        assert_eq!(reports[6]["result"], Value::Null);
        assert_eq!(reports[7]["error"], json!("resourceNotFound"));
    }
}
