use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_test::TestServer;
use crudkit::auth::generate_token;
use crudkit::config::{Config, JwtConfig, PermissionsConfig, TracingConfig};
use crudkit::impl_record;
use crudkit::permissions::prelude::*;
use crudkit::permissions::PermissionsConfiguration;
use crudkit::query::MemoryQuery;
use uuid::Uuid;

const OWNER: Uuid = Uuid::from_u128(1);
const OTHER: Uuid = Uuid::from_u128(2);

#[derive(Debug, Clone, Default)]
struct Order {
    id: i64,
    owner_id: Uuid,
}

impl_record!(Order { id, owner_id });

#[derive(Clone)]
struct AppState {
    config: Config,
    orders: Arc<Vec<Order>>,
    permissions: Arc<PermissionsConfiguration<Order>>,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

fn read() -> Permission {
    Permission::new("Orders", "Read")
}

async fn index(
    principal: MaybeAuthenticated,
    State(state): State<AppState>,
) -> Result<Json<Vec<i64>>, PermissionsError> {
    let permissions =
        RoleRelationPermissionsManager::new(Arc::clone(&state.permissions), Arc::new(principal));

    let query = permissions
        .apply_filter(MemoryQuery::new(state.orders.iter().cloned()), &read())
        .await?;

    Ok(Json(query.into_vec()?.into_iter().map(|order| order.id).collect()))
}

async fn show(
    principal: MaybeAuthenticated,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, PermissionsError> {
    let permissions =
        RoleRelationPermissionsManager::new(Arc::clone(&state.permissions), Arc::new(principal));

    let Some(order) = state.orders.iter().find(|order| order.id == id) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    demand!(permissions, order, &read());
    Ok(Json(order.id).into_response())
}

async fn me(principal: AuthenticatedPrincipal) -> Json<String> {
    Json(principal.user_id().to_string())
}

fn config() -> Config {
    Config {
        tracing: TracingConfig::default(),
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
            expiration_days: 1,
        },
        permissions: PermissionsConfig {
            roles: HashMap::from([("Orders.Read".to_string(), vec!["Admin".to_string()])]),
        },
    }
}

fn server() -> TestServer {
    let config = config();
    let orders = PermissionsNamespace::root("Orders", &["Read"]);

    let mut permissions = PermissionsConfiguration::new();
    permissions.require_relation(&read(), UserRelation::reference("owner_id"));
    permissions
        .apply_role_rules(&[orders], &config.permissions)
        .expect("Failed to apply role rules");

    let state = AppState {
        config,
        orders: Arc::new(vec![
            Order {
                id: 1,
                owner_id: OWNER,
            },
            Order {
                id: 2,
                owner_id: OTHER,
            },
        ]),
        permissions: Arc::new(permissions),
    };

    let router = Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}", get(show))
        .route("/me", get(me))
        .with_state(state);

    TestServer::new(router).expect("Failed to create test server")
}

fn token(user_id: Uuid, roles: &[&str]) -> String {
    let roles: Vec<String> = roles.iter().map(ToString::to_string).collect();
    generate_token(&config(), user_id, &roles).expect("Failed to generate token")
}

#[tokio::test]
async fn test_anonymous_callers_see_nothing() {
    let server = server();

    let index = server.get("/orders").await;
    index.assert_status_ok();
    assert!(index.json::<Vec<i64>>().is_empty());

    server
        .get("/orders/1")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_owners_see_their_orders() {
    let server = server();
    let token = token(OWNER, &[]);

    let index = server.get("/orders").authorization_bearer(&token).await;
    assert_eq!(index.json::<Vec<i64>>(), vec![1]);

    server
        .get("/orders/1")
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    server
        .get("/orders/2")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_configured_role_sees_everything() {
    let server = server();
    let token = token(OTHER, &["Admin"]);

    let index = server.get("/orders").authorization_bearer(&token).await;
    assert_eq!(index.json::<Vec<i64>>(), vec![1, 2]);

    server
        .get("/orders/1")
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_invalid_tokens_are_rejected() {
    let server = server();

    server
        .get("/orders")
        .authorization_bearer("not-a-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/orders")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Basic b3duZXI6"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authenticated_principal_requires_a_token() {
    let server = server();

    server.get("/me").await.assert_status(StatusCode::UNAUTHORIZED);

    let me = server
        .get("/me")
        .authorization_bearer(token(OWNER, &[]))
        .await;
    assert_eq!(me.json::<String>(), OWNER.to_string());
}
