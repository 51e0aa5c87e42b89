use std::time::Duration;

use futures::{stream::BoxStream, StreamExt};
use graphy::{
    CancellationToken, Config, Connection, Context, Error, ErrorCode, GraphqlError, MemoryLimits, Operation, Response,
    Schema,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{json, schema};

fn subscriptions(config: Config) -> Schema {
    let schema = schema(config);
    schema
        .register(
            Operation::subscription("count", |_: Context, to: i32| async move {
                Ok::<_, Error>(futures::stream::iter(1..=to))
            })
            .param_names(["to"]),
        )
        .unwrap();
    schema
        .register(Operation::subscription("ticks", |_: Context| async move {
            Ok::<_, Error>(futures::stream::iter([1]).chain(futures::stream::pending::<i32>()))
        }))
        .unwrap();
    schema
}

async fn next(stream: &mut BoxStream<'static, Response>) -> Option<serde_json::Value> {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .map(|response| json(&response))
}

fn rejected(result: Result<BoxStream<'static, Response>, GraphqlError>) -> GraphqlError {
    match result {
        Ok(_) => unreachable!("the subscription was started"),
        Err(error) => error,
    }
}

#[tokio::test]
async fn one_response_per_event() {
    let schema = subscriptions(Config::default());

    let stream = schema
        .subscribe("subscription { count(to: 3) }", CancellationToken::new())
        .await
        .unwrap();
    let responses = stream.map(|response| json(&response)).collect::<Vec<_>>().await;

    assert_eq!(
        responses,
        [
            json!({"data": {"count": 1}}),
            json!({"data": {"count": 2}}),
            json!({"data": {"count": 3}})
        ]
    );
}

#[tokio::test]
async fn json_entry_point() {
    let schema = subscriptions(Config::default());

    let messages = schema
        .execute_subscription(
            CancellationToken::new(),
            "subscription($to: Int!) { total: count(to: $to) }",
            r#"{"to": 2}"#,
        )
        .await
        .unwrap()
        .collect::<Vec<_>>()
        .await;

    assert_eq!(messages, [r#"{"data":{"total":1}}"#, r#"{"data":{"total":2}}"#]);
}

#[tokio::test]
async fn exactly_one_root_field() {
    let schema = subscriptions(Config::default());

    let error = rejected(
        schema
            .subscribe(
                "subscription { a: count(to: 1) b: count(to: 2) }",
                CancellationToken::new(),
            )
            .await,
    );

    assert_eq!(
        error.message,
        "subscription <anonymous> must select exactly one root field, found 2"
    );
    assert_eq!(error.code, ErrorCode::OperationValidationError);
}

#[tokio::test]
async fn wrong_entry_points() {
    let schema = subscriptions(Config::default());

    let error = rejected(
        schema
            .subscribe(r#"{ greeting(name: "a") }"#, CancellationToken::new())
            .await,
    );
    assert_eq!(error.message, "query greeting used in subscription");

    let response = schema.execute("subscription { count(to: 1) }").await;
    assert_eq!(
        json(&response),
        json!({
            "data": {},
            "errors": [{
                "message": "subscription count used in query",
                "extensions": {"code": "OPERATION_VALIDATION_ERROR"}
            }]
        })
    );
}

#[tokio::test]
async fn cancellation_ends_the_stream() {
    let schema = subscriptions(Config::default());
    let token = CancellationToken::new();

    let mut stream = schema.subscribe("subscription { ticks }", token.clone()).await.unwrap();
    assert_eq!(next(&mut stream).await, Some(json!({"data": {"ticks": 1}})));

    token.cancel();
    assert_eq!(next(&mut stream).await, None);
}

fn one_per_connection() -> Config {
    Config {
        memory: MemoryLimits {
            max_subscriptions_per_connection: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn connection_quota() {
    let schema = subscriptions(one_per_connection());
    let connection = Connection::new(&schema);

    let mut first = connection.subscribe("1", "subscription { ticks }").await.unwrap();
    assert_eq!(next(&mut first).await, Some(json!({"data": {"ticks": 1}})));
    assert_eq!(connection.active(), 1);

    let error = rejected(connection.subscribe("2", "subscription { ticks }").await);
    assert_eq!(error.message, "connection exceeds maximum allowed subscriptions of 1");
    assert_eq!(error.code, ErrorCode::LimitExceeded);

    // Dropping a stream frees its slot.
    drop(first);
    assert_eq!(connection.active(), 0);

    let mut second = connection.subscribe("2", "subscription { ticks }").await.unwrap();
    assert_eq!(next(&mut second).await, Some(json!({"data": {"ticks": 1}})));
}

#[tokio::test]
async fn replacing_a_subscription() {
    let schema = subscriptions(one_per_connection());
    let connection = Connection::new(&schema);

    let mut first = connection.subscribe("1", "subscription { ticks }").await.unwrap();
    assert_eq!(next(&mut first).await, Some(json!({"data": {"ticks": 1}})));

    let mut replacement = connection.subscribe("1", "subscription { ticks }").await.unwrap();
    assert_eq!(next(&mut first).await, None);
    assert_eq!(connection.active(), 1);
    assert_eq!(next(&mut replacement).await, Some(json!({"data": {"ticks": 1}})));

    assert!(connection.stop("1"));
    assert!(!connection.stop("1"));
    assert_eq!(next(&mut replacement).await, None);
    assert_eq!(connection.active(), 0);
}

#[tokio::test]
async fn failed_replacement_keeps_the_running_subscription() {
    let schema = subscriptions(one_per_connection());
    let connection = Connection::new(&schema);

    let mut first = connection.subscribe("1", "subscription { ticks }").await.unwrap();
    assert_eq!(next(&mut first).await, Some(json!({"data": {"ticks": 1}})));

    let error = rejected(connection.subscribe("1", "subscription { unknown }").await);
    assert_eq!(error.code, ErrorCode::OperationValidationError);

    assert_eq!(connection.active(), 1);
    let pending = tokio::time::timeout(Duration::from_millis(50), first.next()).await;
    assert!(pending.is_err(), "the running subscription was cancelled");

    assert!(connection.stop("1"));
    assert_eq!(next(&mut first).await, None);
}

#[tokio::test]
async fn closing_a_connection() {
    let schema = subscriptions(Config::default());
    let connection = Connection::new(&schema);

    let mut ticks = connection.subscribe("ticks", "subscription { ticks }").await.unwrap();
    let mut count = connection
        .subscribe("count", "subscription { count(to: 1) }")
        .await
        .unwrap();
    assert_eq!(connection.active(), 2);
    assert_eq!(next(&mut count).await, Some(json!({"data": {"count": 1}})));
    assert_eq!(next(&mut ticks).await, Some(json!({"data": {"ticks": 1}})));

    connection.close();
    assert_eq!(connection.active(), 0);
    assert_eq!(next(&mut ticks).await, None);
}
