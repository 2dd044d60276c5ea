// Servidor falso para os testes de integração: provedor de identidade
// (protocolo JSON + /oauth2/token) e backend de propriedades.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use mapeamento::{
    config::{AppConfig, AppState, CognitoConfig},
    db::{token_repo::ID_TOKEN_KEY, MemoryTokenStore, TokenStore},
};

pub const PASSWORD: &str = "Senha123";
pub const USER: &str = "joao@example.com";
pub const CHALLENGED_USER: &str = "novo@example.com";
pub const EXISTING_USER: &str = "existe@example.com";
pub const CONFIRMATION_CODE: &str = "123456";
pub const OAUTH_CODE: &str = "codigo-oauth";
pub const GOOD_REFRESH: &str = "refresh-ok";

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

#[derive(Default)]
pub struct Backend {
    pub properties: Vec<Value>,
    pub requests: Vec<Recorded>,
    // Operações do provedor recebidas (X-Amz-Target sem o prefixo)
    pub provider_calls: Vec<String>,
    pub next_id: u64,
    // Resposta forçada para a próxima mutação (POST/PUT/DELETE)
    pub fail_next: Option<(u16, Value)>,
    pub unauthorized: bool,
}

impl Backend {
    pub fn mutations(&self) -> Vec<&Recorded> {
        self.requests.iter().filter(|r| r.method != "GET").collect()
    }
}

pub type Shared = Arc<Mutex<Backend>>;

pub fn jwt(claims: Value) -> String {
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"segredo-de-teste")).unwrap()
}

pub fn fresh_token(username: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    jwt(json!({ "exp": exp, "cognito:username": username, "email": username, "sub": "sub-1" }))
}

pub fn expired_token(username: &str) -> String {
    let exp = chrono::Utc::now().timestamp() - 60;
    jwt(json!({ "exp": exp, "cognito:username": username }))
}

pub fn property_record(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "fazenda",
        "area": 123.92,
        "perimeter": 4448,
        "coordinates": [[0.0, 0.0], [0.01, 0.0], [0.01, 0.01], [0.0, 0.01], [0.0, 0.0]],
        "createdAt": "2024-05-10T13:45:00Z",
        "userId": "sub-1"
    })
}

fn auth_failure(state: &Backend, headers: &HeaderMap) -> Option<Response> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if state.unauthorized || !bearer {
        let body = Json(json!({ "error": "Unauthorized" }));
        return Some((StatusCode::UNAUTHORIZED, body).into_response());
    }
    None
}

fn forced_failure(state: &mut Backend) -> Option<Response> {
    state.fail_next.take().map(|(status, body)| {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    })
}

async fn list_properties(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: "GET",
        path: "/properties".into(),
        body: Value::Null,
    });
    if let Some(resp) = auth_failure(&state, &headers) {
        return resp;
    }
    Json(Value::Array(state.properties.clone())).into_response()
}

async fn create_property(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: "POST",
        path: "/properties".into(),
        body: body.clone(),
    });
    if let Some(resp) = auth_failure(&state, &headers).or_else(|| forced_failure(&mut state)) {
        return resp;
    }

    state.next_id += 1;
    let mut record = body.as_object().cloned().unwrap_or_default();
    record.insert("id".into(), json!(format!("prop-{}", state.next_id)));
    record.insert("userId".into(), json!("sub-1"));
    let record = Value::Object(record);
    state.properties.push(record.clone());

    // Resposta embrulhada, como o backend faz no POST
    (StatusCode::CREATED, Json(json!({ "property": record }))).into_response()
}

async fn update_property(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: "PUT",
        path: format!("/properties/{id}"),
        body: body.clone(),
    });
    if let Some(resp) = auth_failure(&state, &headers).or_else(|| forced_failure(&mut state)) {
        return resp;
    }

    let Some(record) = state.properties.iter_mut().find(|p| p["id"] == json!(id)) else {
        let body = Json(json!({ "error": "Propriedade não encontrada" }));
        return (StatusCode::NOT_FOUND, body).into_response();
    };
    if let (Some(target), Some(changes)) = (record.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(record.clone()).into_response()
}

async fn delete_property(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: "DELETE",
        path: format!("/properties/{id}"),
        body: Value::Null,
    });
    if let Some(resp) = auth_failure(&state, &headers).or_else(|| forced_failure(&mut state)) {
        return resp;
    }
    state.properties.retain(|p| p["id"] != json!(id));
    StatusCode::NO_CONTENT.into_response()
}

fn provider_error(kind: &str, message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "__type": kind, "message": message }))).into_response()
}

fn tokens_for(username: &str) -> Value {
    json!({
        "AuthenticationResult": {
            "AccessToken": fresh_token(username),
            "IdToken": fresh_token(username),
            "RefreshToken": GOOD_REFRESH,
            "ExpiresIn": 3600,
            "TokenType": "Bearer"
        }
    })
}

// Protocolo JSON do Cognito: a operação vem no X-Amz-Target
async fn identity_provider(
    State(state): State<Shared>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let operation = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('.').next())
        .unwrap_or_default()
        .to_string();
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.lock().unwrap().provider_calls.push(operation.clone());

    match operation.as_str() {
        "InitiateAuth" => {
            let username = body["AuthParameters"]["USERNAME"].as_str().unwrap_or_default();
            let password = body["AuthParameters"]["PASSWORD"].as_str().unwrap_or_default();
            match (username, password) {
                (USER, PASSWORD) => Json(tokens_for(USER)).into_response(),
                (CHALLENGED_USER, PASSWORD) => Json(json!({
                    "ChallengeName": "NEW_PASSWORD_REQUIRED",
                    "Session": "sessao-desafio",
                    "ChallengeParameters": {}
                }))
                .into_response(),
                _ => provider_error("NotAuthorizedException", "Incorrect username or password."),
            }
        }
        "RespondToAuthChallenge" => {
            if body["Session"] == json!("sessao-desafio") {
                Json(tokens_for(CHALLENGED_USER)).into_response()
            } else {
                provider_error("NotAuthorizedException", "Invalid session")
            }
        }
        "SignUp" => {
            if body["Username"] == json!(EXISTING_USER) {
                provider_error("UsernameExistsException", "User already exists")
            } else {
                Json(json!({ "UserSub": "sub-novo", "UserConfirmed": false })).into_response()
            }
        }
        "ConfirmSignUp" => {
            if body["ConfirmationCode"] == json!(CONFIRMATION_CODE) {
                Json(json!({})).into_response()
            } else {
                provider_error("CodeMismatchException", "Invalid verification code provided")
            }
        }
        "ResendConfirmationCode" => Json(json!({ "CodeDeliveryDetails": {} })).into_response(),
        _ => provider_error("UnknownOperationException", "Unknown operation"),
    }
}

async fn oauth_token(Form(form): Form<HashMap<String, String>>) -> Response {
    let grant = form.get("grant_type").map(String::as_str).unwrap_or_default();
    let accepted = match grant {
        "authorization_code" => form.get("code").map(String::as_str) == Some(OAUTH_CODE),
        "refresh_token" => form.get("refresh_token").map(String::as_str) == Some(GOOD_REFRESH),
        _ => false,
    };
    if !accepted {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response();
    }

    let exp = chrono::Utc::now().timestamp() + 3600;
    let id_token = jwt(json!({
        "exp": exp,
        "cognito:username": "maria",
        "email": "maria@example.com",
        "name": "Maria Souza"
    }));
    let mut tokens = json!({
        "access_token": jwt(json!({ "exp": exp })),
        "id_token": id_token,
        "expires_in": 3600,
        "token_type": "Bearer"
    });
    if grant == "authorization_code" {
        tokens["refresh_token"] = json!(GOOD_REFRESH);
    }
    Json(tokens).into_response()
}

pub struct TestEnv {
    pub base_url: String,
    pub backend: Shared,
    pub state: AppState,
    pub store: Arc<MemoryTokenStore>,
}

impl TestEnv {
    pub fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    pub fn sign_in_with(&self, token: &str) {
        self.store.set(ID_TOKEN_KEY, token).unwrap();
    }
}

pub fn app_config(base_url: &str) -> AppConfig {
    let cognito = CognitoConfig::new(
        "us-east-1",
        "pool-teste",
        "client-teste",
        "dominio",
        "http://localhost:8080",
    )
    .with_endpoints(format!("{base_url}/cognito"), base_url);
    AppConfig {
        cognito,
        properties_api_url: format!("{base_url}/properties"),
        session_store_path: PathBuf::from("nao-usado.json"),
    }
}

pub async fn start() -> TestEnv {
    let backend: Shared = Arc::new(Mutex::new(Backend::default()));

    let app = Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route("/properties/{id}", put(update_property).delete(delete_property))
        .route("/cognito", post(identity_provider))
        .route("/oauth2/token", post(oauth_token))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Espera o servidor aceitar conexões
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(format!("{}/properties", base_url)).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    backend.lock().unwrap().requests.clear();

    let store = Arc::new(MemoryTokenStore::new());
    let state = AppState::with_store(app_config(&base_url), store.clone()).unwrap();

    TestEnv {
        base_url,
        backend,
        state,
        store,
    }
}

// Endereço onde ninguém escuta (para simular falha de conectividade)
pub async fn dead_address() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
