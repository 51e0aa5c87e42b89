use graphy::{
    CancellationToken, ConstValue, Context, Dyn, Error, ErrorCode, GraphQLType, Operation, RegistrationError,
    ScalarDescriptor, Schema, TypeBuilder, ID,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::json;

#[derive(Clone)]
struct Cat {
    name: String,
    lives: i32,
}

impl GraphQLType for Cat {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("name", |cat| &cat.name);
        ty.field("lives", |cat| &cat.lives);
    }
}

#[derive(Clone)]
struct Dog {
    name: String,
    good: bool,
}

impl GraphQLType for Dog {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("name", |dog| &dog.name);
        ty.field("good", |dog| &dog.good);
    }
}

#[derive(Clone)]
struct Pet {
    cat: Option<Cat>,
    dog: Option<Dog>,
}

impl GraphQLType for Pet {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.union();
        ty.field("cat", |pet| &pet.cat);
        ty.field("dog", |pet| &pet.dog);
    }
}

fn tom() -> Cat {
    Cat {
        name: "Tom".into(),
        lives: 9,
    }
}

fn rex() -> Dog {
    Dog {
        name: "Rex".into(),
        good: true,
    }
}

fn pets_schema() -> Schema {
    let schema = Schema::default();
    schema
        .register(Operation::query("pets", |_: Context| async move {
            Ok::<_, Error>(vec![
                Pet {
                    cat: Some(tom()),
                    dog: None,
                },
                Pet {
                    cat: None,
                    dog: Some(rex()),
                },
            ])
        }))
        .unwrap();
    schema
        .register(Operation::query("confused", |_: Context| async move {
            Ok::<_, Error>(Pet {
                cat: Some(tom()),
                dog: Some(rex()),
            })
        }))
        .unwrap();
    schema
}

#[tokio::test]
async fn unions_resolve_to_their_member() {
    let schema = pets_schema();

    let response = schema
        .execute("{ pets { __typename ... on Cat { name lives } ... on Dog { name good } } }")
        .await;

    assert_eq!(
        json(&response),
        json!({
            "data": {"pets": [
                {"__typename": "Cat", "name": "Tom", "lives": 9},
                {"__typename": "Dog", "name": "Rex", "good": true}
            ]}
        })
    );
}

#[tokio::test]
async fn unions_with_more_than_one_member() {
    let schema = pets_schema();

    let response = schema.execute("{ confused { __typename } pets { __typename } }").await;

    assert_eq!(
        json(&response),
        json!({
            "data": {
                "confused": null,
                "pets": [{"__typename": "Cat"}, {"__typename": "Dog"}]
            },
            "errors": [{
                "message": "union Pet: more than one field is not nil (cat, dog)",
                "locations": [{"line": 1, "column": 3}],
                "path": ["confused"],
                "extensions": {"code": "RESOLVER_ERROR"}
            }]
        })
    );
}

#[tokio::test]
async fn union_fields_need_a_fragment() {
    let schema = pets_schema();

    let response = schema.execute("{ pets { name } }").await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "unknown field name on type Pet");
    assert_eq!(response.errors[0].code, ErrorCode::OperationValidationError);

    let response = schema.execute("{ pets { ... on User { name } } }").await;
    assert_eq!(response.errors[0].message, "fragment on User cannot be spread within Pet");
}

#[derive(Clone)]
struct Node;

impl GraphQLType for Node {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.interface_field::<ID>("id");
        ty.implementor::<Account>();
        ty.implementor::<Team>();
    }
}

#[derive(Clone)]
struct Account {
    id: ID,
    login: String,
}

impl GraphQLType for Account {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("id", |account| &account.id);
        ty.field("login", |account| &account.login);
    }
}

#[derive(Clone)]
struct Team {
    id: ID,
    members: Vec<Account>,
}

impl GraphQLType for Team {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("id", |team| &team.id);
        ty.field("members", |team| &team.members);
    }
}

#[derive(Clone)]
struct Stranger {
    id: ID,
}

impl GraphQLType for Stranger {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("id", |stranger| &stranger.id);
    }
}

async fn nodes(_: Context) -> Result<Vec<Dyn<Node>>, Error> {
    let ada = Account {
        id: "a1".into(),
        login: "ada".into(),
    };

    Ok(vec![
        Dyn::new(ada.clone()),
        Dyn::new(Team {
            id: "t1".into(),
            members: vec![ada],
        }),
        Dyn::new(Stranger { id: "s1".into() }),
    ])
}

#[tokio::test]
async fn interfaces_resolve_to_the_concrete_type() {
    let schema = Schema::default();
    schema.register(Operation::query("nodes", nodes)).unwrap();

    let response = schema
        .execute("{ nodes { id __typename ... on Account { login } ... on Team { members { login } } } }")
        .await;

    assert_eq!(
        json(&response),
        json!({
            "data": {"nodes": [
                {"id": "a1", "__typename": "Account", "login": "ada"},
                {"id": "t1", "__typename": "Team", "members": [{"login": "ada"}]},
                null
            ]},
            "errors": [{
                "message": format!("{} does not implement interface Node", std::any::type_name::<Stranger>()),
                "locations": [{"line": 1, "column": 3}],
                "path": ["nodes", 2],
                "extensions": {"code": "RESOLVER_ERROR"}
            }]
        })
    );
}

#[derive(Clone, Debug, PartialEq)]
struct UserId(String);

impl GraphQLType for UserId {
    fn describe(_: &mut TypeBuilder<Self>) {}
}

fn parse_user_id(value: &ConstValue) -> Result<UserId, Error> {
    match value {
        ConstValue::String(value) => value
            .strip_prefix("user_")
            .map(|id| UserId(id.to_string()))
            .ok_or_else(|| Error::new(format!("invalid user id {value}"))),
        _ => Err(Error::new("a user id must be a string")),
    }
}

fn user_id_scalar() -> ScalarDescriptor {
    ScalarDescriptor::new(
        "UserID",
        |id: &UserId| ConstValue::String(format!("user_{}", id.0)),
        parse_user_id,
    )
}

async fn echo(_: Context, id: UserId) -> Result<UserId, Error> {
    Ok(UserId(format!("{}0", id.0)))
}

#[tokio::test]
async fn custom_scalars() {
    let schema = Schema::default();

    let error = schema.register(Operation::query("echo", echo)).unwrap_err();
    assert!(matches!(error, RegistrationError::UnsupportedType { .. }), "{error}");

    schema.register_scalar(user_id_scalar()).unwrap();
    schema.register(Operation::query("echo", echo).param_names(["id"])).unwrap();

    let response = schema.execute(r#"{ echo(id: "user_12") }"#).await;
    assert_eq!(response.to_json().unwrap(), r#"{"data":{"echo":"user_120"}}"#);

    let response = schema
        .execute_query_or_mutation(
            CancellationToken::new(),
            "query($id: UserID!) { echo(id: $id) }",
            r#"{"id": "user_7"}"#,
        )
        .await
        .unwrap();
    assert_eq!(response, r#"{"data":{"echo":"user_70"}}"#);

    let response = schema.execute(r#"{ echo(id: "12") }"#).await;
    assert_eq!(
        json(&response),
        json!({
            "data": {"echo": null},
            "errors": [{
                "message": "invalid user id 12",
                "locations": [{"line": 1, "column": 3}],
                "path": ["echo"],
                "extensions": {"code": "VALIDATION_ERROR"}
            }]
        })
    );
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Role {
    Admin,
    Guest,
}

impl GraphQLType for Role {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.enum_value("ADMIN", Role::Admin);
        ty.enum_value("GUEST", Role::Guest);
    }
}

async fn promote(_: Context, role: Role) -> Result<Role, Error> {
    Ok(match role {
        Role::Guest => Role::Admin,
        Role::Admin => Role::Admin,
    })
}

async fn roles(_: Context) -> Result<Vec<Role>, Error> {
    Ok(vec![Role::Guest, Role::Admin])
}

#[tokio::test]
async fn enums() {
    let schema = Schema::default();
    schema.register(Operation::query("promote", promote).param_names(["role"])).unwrap();
    schema.register(Operation::query("roles", roles)).unwrap();

    let response = schema.execute("{ promote(role: GUEST) roles }").await;
    assert_eq!(
        json(&response),
        json!({"data": {"promote": "ADMIN", "roles": ["GUEST", "ADMIN"]}})
    );

    let response = schema.execute("{ promote(role: OWNER) }").await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "enum Role has no value OWNER");
    assert_eq!(response.errors[0].code, ErrorCode::ValidationError);
}

async fn scores(_: Context) -> Result<IndexMap<String, i32>, Error> {
    Ok(IndexMap::from([("zoe".to_string(), 3), ("adam".to_string(), 1)]))
}

#[tokio::test]
async fn maps_are_leaves() {
    let schema = Schema::default();
    schema.register(Operation::query("scores", scores)).unwrap();

    let response = schema.execute("{ scores }").await;
    assert_eq!(response.to_json().unwrap(), r#"{"data":{"scores":{"zoe":3,"adam":1}}}"#);

    let response = schema.execute("{ scores { zoe } }").await;
    assert_eq!(
        response.errors[0].message,
        "field scores of type Int must not have a selection"
    );
}

#[derive(Clone)]
struct Audit {
    created_by: String,
}

impl GraphQLType for Audit {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("createdBy", |audit| &audit.created_by);
    }
}

#[derive(Clone)]
struct Entity {
    id: ID,
    audit: Audit,
}

impl GraphQLType for Entity {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.field("id", |entity| &entity.id);
        ty.embed(|entity| &entity.audit);
    }
}

#[derive(Clone)]
struct Document {
    entity: Option<Box<Entity>>,
    title: String,
}

impl GraphQLType for Document {
    fn describe(ty: &mut TypeBuilder<Self>) {
        ty.embed_ptr(|document| document.entity.as_deref());
        ty.field("title", |document| &document.title);
    }
}

async fn documents(_: Context) -> Result<Vec<Document>, Error> {
    Ok(vec![
        Document {
            entity: Some(Box::new(Entity {
                id: "d1".into(),
                audit: Audit {
                    created_by: "ada".into(),
                },
            })),
            title: "Notes".into(),
        },
        Document {
            entity: None,
            title: "Draft".into(),
        },
    ])
}

#[tokio::test]
async fn embedded_fields_are_promoted() {
    let schema = Schema::default();
    schema.register(Operation::query("documents", documents)).unwrap();

    let response = schema.execute("{ documents { title id createdBy } }").await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "documents": [
          {
            "title": "Notes",
            "id": "d1",
            "createdBy": "ada"
          },
          {
            "title": "Draft",
            "id": null,
            "createdBy": null
          }
        ]
      },
      "errors": [
        {
          "message": "cannot resolve field id: nil embedded pointer to Entity",
          "locations": [
            {
              "line": 1,
              "column": 21
            }
          ],
          "path": [
            "documents",
            1,
            "id"
          ],
          "extensions": {
            "code": "NAVIGATION_ERROR"
          }
        },
        {
          "message": "cannot resolve field createdBy: nil embedded pointer to Entity",
          "locations": [
            {
              "line": 1,
              "column": 24
            }
          ],
          "path": [
            "documents",
            1,
            "createdBy"
          ],
          "extensions": {
            "code": "NAVIGATION_ERROR"
          }
        }
      ]
    }
    "###);
}
