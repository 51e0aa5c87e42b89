use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use graphy::{
    CancellationToken, Config, Context, Error, ErrorCode, GraphQLType, Operation, QueryLimits, Schema, TypeBuilder,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{json, schema};

fn limits(limits: QueryLimits) -> Config {
    Config {
        limits,
        ..Default::default()
    }
}

#[tokio::test]
async fn depth() {
    let query = "{ user { friends { friends { name } } } }";

    let response = schema(limits(QueryLimits {
        max_depth: 3,
        ..Default::default()
    }))
    .execute(query)
    .await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {},
      "errors": [
        {
          "message": "query depth 4 exceeds maximum allowed depth of 3",
          "locations": [
            {
              "line": 1,
              "column": 30
            }
          ],
          "extensions": {
            "code": "LIMIT_EXCEEDED"
          }
        }
      ]
    }
    "###);

    let response = schema(limits(QueryLimits {
        max_depth: 4,
        ..Default::default()
    }))
    .execute(query)
    .await;

    assert_eq!(
        json(&response),
        json!({"data": {"user": {"friends": [{"friends": []}, {"friends": [{"name": "Grace"}]}]}}})
    );
}

#[derive(Clone)]
struct Node {
    name: String,
    children: Vec<Node>,
}

impl GraphQLType for Node {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("name", |node| &node.name);
        ty.field("children", |node| &node.children);
    }
}

fn leaf() -> Node {
    Node {
        name: "leaf".into(),
        children: Vec::new(),
    }
}

async fn root(_: Context) -> Result<Node, Error> {
    Ok(leaf())
}

async fn make(ctx: Context) -> Result<Node, Error> {
    if let Some(gauge) = ctx.data::<Gauge>() {
        gauge.running.fetch_add(1, Ordering::SeqCst);
    }
    Ok(leaf())
}

#[tokio::test]
async fn depth_does_not_depend_on_the_data() {
    let schema = schema(limits(QueryLimits {
        max_depth: 2,
        ..Default::default()
    }));
    schema.register(Operation::query("root", root)).unwrap();

    let response = schema.execute("{ root { children { children { children { name } } } } }").await;
    assert_eq!(
        json(&response),
        json!({
            "data": {},
            "errors": [{
                "message": "query depth 3 exceeds maximum allowed depth of 2",
                "locations": [{"line": 1, "column": 21}],
                "extensions": {"code": "LIMIT_EXCEEDED"}
            }]
        })
    );

    let response = schema.execute("{ root { name } }").await;
    assert_eq!(json(&response), json!({"data": {"root": {"name": "leaf"}}}));

    // Skipped selections do not count.
    let response = schema
        .execute("{ root { name children @skip(if: true) { children { name } } } }")
        .await;
    assert_eq!(json(&response), json!({"data": {"root": {"name": "leaf"}}}));
}

#[tokio::test]
async fn mutations_too_deep_are_not_executed() {
    let gauge = Gauge::default();
    let schema = Schema::builder()
        .config(limits(QueryLimits {
            max_depth: 2,
            ..Default::default()
        }))
        .data(gauge.clone())
        .finish();
    schema.register(Operation::mutation("make", make)).unwrap();

    let response = schema.execute("mutation { make { children { children { name } } } }").await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "query depth 3 exceeds maximum allowed depth of 2"
    );
    assert_eq!(gauge.running.load(Ordering::SeqCst), 0);

    let response = schema.execute("mutation { make { name } }").await;
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(gauge.running.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fields() {
    let schema = schema(limits(QueryLimits {
        max_fields: 2,
        ..Default::default()
    }));

    let response = schema.execute("{ user { id name email } }").await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code, ErrorCode::LimitExceeded);
    assert!(
        response.errors[0].message.contains("exceeds maximum allowed fields"),
        "{}",
        response.errors[0].message
    );

    let response = schema.execute("{ user { id name } }").await;
    assert!(response.is_ok());
}

#[tokio::test]
async fn aliases() {
    let schema = schema(limits(QueryLimits {
        max_aliases: 2,
        ..Default::default()
    }));

    let response = schema
        .execute(r#"{ a: greeting(name: "a") b: greeting(name: "b") c: greeting(name: "c") }"#)
        .await;
    assert_eq!(
        json(&response),
        json!({
            "data": {},
            "errors": [{
                "message": "3 aliases exceeds maximum allowed aliases of 2",
                "locations": [{"line": 1, "column": 49}],
                "extensions": {"code": "LIMIT_EXCEEDED"}
            }]
        })
    );

    let response = schema
        .execute(r#"{ a: greeting(name: "a") b: greeting(name: "b") greeting(name: "c") }"#)
        .await;
    assert_eq!(
        json(&response),
        json!({"data": {"a": "Hello, a", "b": "Hello, b", "greeting": "Hello, c"}})
    );
}

#[tokio::test]
async fn complexity() {
    let query = r#"{ a: greeting(name: "a") b: greeting(name: "b") }"#;

    let response = schema(limits(QueryLimits {
        max_complexity: 1,
        ..Default::default()
    }))
    .execute(query)
    .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "query complexity 2 exceeds maximum allowed complexity of 1"
    );
    assert_eq!(json(&response)["data"], json!({}));

    let response = schema(limits(QueryLimits {
        max_complexity: 2,
        ..Default::default()
    }))
    .execute(query)
    .await;
    assert!(response.is_ok());
}

#[tokio::test]
async fn complexity_of_lists_uses_the_estimate() {
    let schema = schema(limits(QueryLimits {
        max_complexity: 20,
        list_size_estimate: 5,
        ..Default::default()
    }));

    // user (1) + friends (5 * (1 + name)) = 11
    let response = schema.execute("{ user { friends { name } } }").await;
    assert!(response.is_ok(), "{:?}", response.errors);

    // user (1) + friends (5 * (1 + name + initial + id)) = 21
    let response = schema.execute("{ user { friends { name initial id } } }").await;
    assert!(!response.is_ok());
    assert!(response.errors[0].message.contains("exceeds maximum allowed complexity"));
}

async fn numbers(_: Context) -> Result<Vec<i32>, Error> {
    Ok((0..10).collect())
}

#[tokio::test]
async fn arrays_are_truncated() {
    let schema = Schema::new(limits(QueryLimits {
        max_array_size: 5,
        ..Default::default()
    }));
    schema.register(Operation::query("numbers", numbers)).unwrap();

    let response = schema.execute("{ numbers }").await;

    assert_eq!(response.to_json().unwrap(), r#"{"data":{"numbers":[0,1,2,3,4]}}"#);
}

#[derive(Clone, Default)]
struct Gauge {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

async fn busy(ctx: Context) -> Result<bool, Error> {
    let Some(gauge) = ctx.data::<Gauge>() else {
        return Err(Error::new("missing gauge"));
    };
    let running = gauge.running.fetch_add(1, Ordering::SeqCst) + 1;
    gauge.peak.fetch_max(running, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10)).await;
    gauge.running.fetch_sub(1, Ordering::SeqCst);
    Ok(true)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolvers() {
    let gauge = Gauge::default();
    let schema = Schema::builder()
        .config(limits(QueryLimits {
            max_concurrent_resolvers: 1,
            ..Default::default()
        }))
        .data(gauge.clone())
        .finish();
    schema.register(Operation::query("busy", busy)).unwrap();

    let response = schema.execute("{ a: busy b: busy c: busy }").await;

    assert_eq!(json(&response), json!({"data": {"a": true, "b": true, "c": true}}));
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);

    let gauge = Gauge::default();
    let schema = Schema::builder().data(gauge.clone()).finish();
    schema.register(Operation::query("busy", busy)).unwrap();

    let response = schema.execute("{ a: busy b: busy c: busy }").await;

    assert!(response.is_ok());
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancelled_requests_do_not_run_resolvers() {
    let gauge = Gauge::default();
    let schema = Schema::builder().data(gauge.clone()).finish();
    schema.register(Operation::query("busy", busy)).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let response = schema.execute_with_cancellation("{ busy }", token).await;

    assert_eq!(
        json(&response),
        json!({"data": {}, "errors": [{"message": "Request was cancelled", "extensions": {"code": "CANCELLED"}}]})
    );
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 0);
}

async fn wait_for_cancellation(ctx: Context) -> Result<bool, Error> {
    ctx.cancelled().await;
    Ok(ctx.is_cancelled())
}

#[tokio::test]
async fn resolvers_observe_cancellation() {
    let schema = Schema::default();
    schema
        .register(Operation::query("wait", wait_for_cancellation))
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let response = schema.execute_with_cancellation("{ wait }", token).await;

    assert_eq!(json(&response), json!({"data": {"wait": true}}));
}
