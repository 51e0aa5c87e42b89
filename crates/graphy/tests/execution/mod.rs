use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use graphy::{
    CachedStub, CancellationToken, Config, Context, Error, ErrorCode, GraphQLType, InMemoryStubCache, InputFields,
    MemoryLimits, Operation, PayloadError, Request, RequestError, RequestStubCache, Schema, TypeBuilder, Variables,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{json, schema};

#[tokio::test]
async fn greeting() {
    let schema = schema(Config::default());

    let response = schema
        .execute_query_or_mutation(CancellationToken::new(), r#"{ greeting(name: "World") }"#, "")
        .await
        .unwrap();

    assert_eq!(response, r#"{"data":{"greeting":"Hello, World"}}"#);
}

#[tokio::test]
async fn variables() {
    let schema = schema(Config::default());

    let response = schema
        .execute_query_or_mutation(
            CancellationToken::new(),
            "query Greet($name: String! = \"nobody\") { greeting(name: $name) }",
            r#"{"name": "Ada"}"#,
        )
        .await
        .unwrap();
    assert_eq!(response, r#"{"data":{"greeting":"Hello, Ada"}}"#);

    let response = schema
        .execute_query_or_mutation(
            CancellationToken::new(),
            "query Greet($name: String! = \"nobody\") { greeting(name: $name) }",
            "",
        )
        .await
        .unwrap();
    assert_eq!(response, r#"{"data":{"greeting":"Hello, nobody"}}"#);

    let response = schema
        .execute("query Greet($name: String!) { greeting(name: $name) }")
        .await;
    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {},
      "errors": [
        {
          "message": "variable $name of required type String! was not provided",
          "locations": [
            {
              "line": 1,
              "column": 13
            }
          ],
          "extensions": {
            "code": "VARIABLE_ERROR"
          }
        }
      ]
    }
    "###);
}

#[tokio::test]
async fn payload_limits() {
    let schema = schema(Config {
        memory: MemoryLimits {
            max_variable_size: 16,
            ..Default::default()
        },
        ..Default::default()
    });
    let query = "query($name: String!) { greeting(name: $name) }";

    let response = schema
        .execute_query_or_mutation(CancellationToken::new(), query, r#"{"name": "Ada"}"#)
        .await
        .unwrap();
    assert_eq!(response, r#"{"data":{"greeting":"Hello, Ada"}}"#);

    let error = schema
        .execute_query_or_mutation(CancellationToken::new(), query, r#"{"name": "Ada Lovelace"}"#)
        .await
        .unwrap_err();
    assert!(
        matches!(
            error,
            RequestError::Payload(PayloadError::VariablesTooLarge { size: 24, max: 16 })
        ),
        "{error}"
    );
}

#[tokio::test]
async fn nested_selections_keep_selection_order() {
    let schema = schema(Config::default());

    let response = schema
        .execute("{ user { name id friends { name initial } email } }")
        .await;

    assert_eq!(
        response.to_json().unwrap(),
        r#"{"data":{"user":{"name":"Ada","id":"1","friends":[{"name":"Grace","initial":"G"},{"name":"Alan","initial":"A"}],"email":"ada@example.com"}}}"#
    );
}

#[tokio::test]
async fn fragments_and_aliases() {
    let schema = schema(Config::default());

    let response = schema
        .execute(
            r#"
            query {
                first: greeting(name: "one")
                user { ...Names friends { ... on User { who: name } } }
            }

            fragment Names on User {
                name
                initial
            }
            "#,
        )
        .await;

    assert_eq!(
        json(&response),
        json!({
            "data": {
                "first": "Hello, one",
                "user": {
                    "name": "Ada",
                    "initial": "A",
                    "friends": [{"who": "Grace"}, {"who": "Alan"}]
                }
            }
        })
    );
}

#[tokio::test]
async fn typename() {
    let schema = schema(Config::default());

    let response = schema.execute("{ __typename user { __typename name } }").await;

    assert_eq!(
        json(&response),
        json!({"data": {"__typename": "Query", "user": {"__typename": "User", "name": "Ada"}}})
    );
}

#[tokio::test]
async fn skip_and_include() {
    let schema = schema(Config::default());

    let query = r#"
        query($skip: Boolean!) {
            a: greeting(name: "a") @skip(if: $skip)
            b: greeting(name: "b") @include(if: $skip)
            user @include(if: true) { name @skip(if: false) }
        }
    "#;

    let variables = Variables::from_json(json!({"skip": true})).unwrap();
    let response = schema.execute(Request::new(query).variables(variables)).await;
    assert_eq!(
        json(&response),
        json!({"data": {"b": "Hello, b", "user": {"name": "Ada"}}})
    );

    let variables = Variables::from_json(json!({"skip": false})).unwrap();
    let response = schema.execute(Request::new(query).variables(variables)).await;
    assert_eq!(
        json(&response),
        json!({"data": {"a": "Hello, a", "user": {"name": "Ada"}}})
    );
}

#[tokio::test]
async fn operation_name_selects_the_operation() {
    let schema = schema(Config::default());
    let document = r#"
        query First { greeting(name: "first") }
        query Second { greeting(name: "second") }
    "#;

    let response = schema.execute(Request::new(document).operation_name("Second")).await;
    assert_eq!(json(&response), json!({"data": {"greeting": "Hello, second"}}));

    let response = schema.execute(document).await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code, ErrorCode::OperationParsingError);
}

async fn failing(_: Context) -> Result<String, Error> {
    Err(Error::new("boom"))
}

async fn succeeding(_: Context) -> Result<String, Error> {
    Ok("ok".to_string())
}

#[tokio::test]
async fn partial_failure() {
    let schema = Schema::default();
    schema.register(Operation::query("failing", failing)).unwrap();
    schema.register(Operation::query("succeeding", succeeding)).unwrap();

    let response = schema.execute("{ failing succeeding }").await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "failing": null,
        "succeeding": "ok"
      },
      "errors": [
        {
          "message": "boom",
          "locations": [
            {
              "line": 1,
              "column": 3
            }
          ],
          "path": [
            "failing"
          ],
          "extensions": {
            "code": "RESOLVER_ERROR"
          }
        }
      ]
    }
    "###);
}

#[allow(clippy::panic)]
async fn explode(_: Context) -> Result<String, Error> {
    panic!("kaboom")
}

#[tokio::test]
async fn panics_are_field_errors() {
    let schema = Schema::default();
    schema.register(Operation::query("explode", explode)).unwrap();
    schema.register(Operation::query("succeeding", succeeding)).unwrap();

    let response = schema.execute("{ explode succeeding }").await;

    assert_eq!(
        json(&response),
        json!({
            "data": {"explode": null, "succeeding": "ok"},
            "errors": [{
                "message": "resolver explode panicked: kaboom",
                "locations": [{"line": 1, "column": 3}],
                "path": ["explode"],
                "extensions": {"code": "INTERNAL_SERVER_ERROR"}
            }]
        })
    );
}

#[derive(Clone)]
struct Profile {
    bio: String,
}

impl GraphQLType for Profile {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("bio", |profile| &profile.bio);
        ty.try_method("verified", |profile| {
            if profile.bio.is_empty() {
                Err("bio is empty")
            } else {
                Ok(true)
            }
        });
    }
}

#[tokio::test]
async fn method_errors_are_attached_to_their_path() {
    let schema = Schema::default();
    schema
        .register(Operation::query("profiles", |_: Context| async move {
            Ok::<_, Error>(vec![
                Profile { bio: "hello".into() },
                Profile { bio: String::new() },
            ])
        }))
        .unwrap();

    let response = schema.execute("{ profiles { bio verified } }").await;

    assert_eq!(
        json(&response),
        json!({
            "data": {"profiles": [
                {"bio": "hello", "verified": true},
                {"bio": "", "verified": null}
            ]},
            "errors": [{
                "message": "bio is empty",
                "locations": [{"line": 1, "column": 18}],
                "path": ["profiles", 1, "verified"],
                "extensions": {"code": "RESOLVER_ERROR"}
            }]
        })
    );
}

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

async fn append(ctx: Context, entry: String, delay: i32) -> Result<String, Error> {
    tokio::time::sleep(Duration::from_millis(u64::try_from(delay).unwrap_or_default())).await;
    if let Some(journal) = ctx.data::<Journal>() {
        journal.0.lock().unwrap().push(entry.clone());
    }
    Ok(entry)
}

#[tokio::test]
async fn mutations_run_serially() {
    let journal = Journal::default();
    let schema = Schema::builder().data(journal.clone()).finish();
    schema
        .register(Operation::mutation("append", append).param_names(["entry", "delay"]))
        .unwrap();

    let response = schema
        .execute(
            r#"mutation {
                slow: append(entry: "slow", delay: 30)
                fast: append(entry: "fast", delay: 0)
            }"#,
        )
        .await;

    assert_eq!(json(&response), json!({"data": {"slow": "slow", "fast": "fast"}}));
    assert_eq!(*journal.0.lock().unwrap(), ["slow", "fast"]);
}

#[derive(Clone, Default)]
struct Calls(Arc<AtomicUsize>);

#[derive(Clone)]
struct NewUser {
    name: String,
    tags: Vec<String>,
}

impl GraphQLType for NewUser {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.input_field::<String>("name");
        ty.input_field::<Vec<String>>("tags");
    }

    fn from_input(fields: &mut InputFields<'_>) -> Result<Self, Error> {
        Ok(NewUser {
            name: fields.take("name")?,
            tags: fields.take("tags")?,
        })
    }

    fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::new("name must not be empty"));
        }
        Ok(())
    }
}

async fn create_user(ctx: Context, input: NewUser) -> Result<String, Error> {
    if let Some(calls) = ctx.data::<Calls>() {
        calls.0.fetch_add(1, Ordering::SeqCst);
    }
    Ok(format!("{} [{}]", input.name, input.tags.join(", ")))
}

#[tokio::test]
async fn validation_runs_before_the_resolver() {
    let calls = Calls::default();
    let schema = Schema::builder().data(calls.clone()).finish();
    schema.register(Operation::mutation("createUser", create_user)).unwrap();

    let response = schema
        .execute(r#"mutation { createUser(name: "  ", tags: ["a"]) }"#)
        .await;
    assert_eq!(
        json(&response),
        json!({
            "data": {"createUser": null},
            "errors": [{
                "message": "name must not be empty",
                "locations": [{"line": 1, "column": 12}],
                "path": ["createUser"],
                "extensions": {"code": "VALIDATION_ERROR"}
            }]
        })
    );
    assert_eq!(calls.0.load(Ordering::SeqCst), 0);

    let response = schema
        .execute(r#"mutation { createUser(name: "Ada", tags: ["a", "b"]) }"#)
        .await;
    assert_eq!(json(&response), json!({"data": {"createUser": "Ada [a, b]"}}));
    assert_eq!(calls.0.load(Ordering::SeqCst), 1);
}

#[derive(Clone)]
struct Tag {
    label: String,
}

impl GraphQLType for Tag {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.input_field::<String>("label");
    }

    fn from_input(fields: &mut InputFields<'_>) -> Result<Self, Error> {
        Ok(Tag {
            label: fields.take("label")?,
        })
    }

    fn validate(&self) -> Result<(), Error> {
        if self.label.is_empty() {
            return Err(Error::new("tag label empty"));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct Author {
    name: String,
}

impl GraphQLType for Author {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.input_field::<String>("name");
    }

    fn from_input(fields: &mut InputFields<'_>) -> Result<Self, Error> {
        Ok(Author {
            name: fields.take("name")?,
        })
    }

    fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::new("author name empty"));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct NewPost {
    author: Author,
    tags: Vec<Tag>,
}

impl GraphQLType for NewPost {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.input_field::<Author>("author");
        ty.input_field::<Vec<Tag>>("tags");
    }

    fn from_input(fields: &mut InputFields<'_>) -> Result<Self, Error> {
        Ok(NewPost {
            author: fields.take("author")?,
            tags: fields.take("tags")?,
        })
    }
}

async fn post(ctx: Context, input: NewPost) -> Result<String, Error> {
    if let Some(calls) = ctx.data::<Calls>() {
        calls.0.fetch_add(1, Ordering::SeqCst);
    }
    let labels = input.tags.iter().map(|tag| tag.label.as_str()).collect::<Vec<_>>();
    Ok(format!("{}: {}", input.author.name, labels.join(", ")))
}

#[tokio::test]
async fn nested_inputs_are_validated() {
    let calls = Calls::default();
    let schema = Schema::builder().data(calls.clone()).finish();
    schema.register(Operation::mutation("post", post)).unwrap();

    let response = schema
        .execute(r#"mutation { post(author: {name: "Ada"}, tags: [{label: "a"}, {label: ""}]) }"#)
        .await;
    assert_eq!(
        json(&response),
        json!({
            "data": {"post": null},
            "errors": [{
                "message": "tag label empty",
                "locations": [{"line": 1, "column": 12}],
                "path": ["post"],
                "extensions": {"code": "VALIDATION_ERROR"}
            }]
        })
    );

    // The first failure wins.
    let response = schema
        .execute(r#"mutation { post(author: {name: ""}, tags: [{label: ""}]) }"#)
        .await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "author name empty");
    assert_eq!(calls.0.load(Ordering::SeqCst), 0);

    let response = schema
        .execute(r#"mutation { post(author: {name: "Ada"}, tags: [{label: "a"}, {label: "b"}]) }"#)
        .await;
    assert_eq!(json(&response), json!({"data": {"post": "Ada: a, b"}}));
    assert_eq!(calls.0.load(Ordering::SeqCst), 1);
}

#[derive(Clone)]
struct RecordingCache {
    stubs: Arc<InMemoryStubCache>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingCache {
    fn new() -> Self {
        RecordingCache {
            stubs: Arc::new(InMemoryStubCache::new(16)),
            log: Default::default(),
        }
    }

    fn record(&self, event: &'static str) {
        self.log.lock().unwrap().push(event);
    }

    fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }
}

impl RequestStubCache for RecordingCache {
    fn get(&self, key: &str) -> Option<CachedStub> {
        let cached = self.stubs.get(key);
        self.record(if cached.is_some() { "hit" } else { "miss" });
        cached
    }

    fn set(&self, key: &str, stub: CachedStub) {
        self.record("set");
        self.stubs.set(key, stub);
    }

    fn clear(&self) {
        self.record("clear");
        self.stubs.clear();
    }
}

async fn ping(_: Context) -> Result<bool, Error> {
    Ok(true)
}

#[tokio::test]
async fn request_stubs_are_cached() {
    let cache = RecordingCache::new();
    let schema = Schema::builder().with_stub_cache(cache.clone()).finish();
    schema.register(Operation::query("ping", ping)).unwrap();
    assert_eq!(cache.take(), ["clear"]);

    let first = schema.prepare("{ ping }", None).unwrap();
    let second = schema.prepare("{ ping }", None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.take(), ["miss", "set", "hit"]);

    // Compile errors are cached too.
    for _ in 0..2 {
        let error = schema.prepare("{ pong }", None).unwrap_err();
        assert_eq!(error.code(), ErrorCode::OperationValidationError);
    }
    assert_eq!(cache.take(), ["miss", "set", "hit"]);

    schema.register(Operation::query("pong", ping)).unwrap();
    assert_eq!(cache.take(), ["clear"]);

    assert!(schema.prepare("{ pong }", None).is_ok());
    let third = schema.prepare("{ ping }", None).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));

    let response = schema.execute("{ ping pong }").await;
    assert_eq!(json(&response), json!({"data": {"ping": true, "pong": true}}));
}
