//! In-process stand-in for the remote ticket API.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    net::TcpListener as StdTcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use ticket_desk::{
    config,
    model::{
        ticket::{NewTicket, Priority},
        user::{self, Role},
        User,
    },
    transport::{Request, ACKNOWLEDGED},
    Client, DegradedStore, Error, Gateway, TokenStore, Transport,
};
use tokio::{net::TcpListener, sync::Notify};

pub const TOKEN: &str = "token-123";
pub const PASSWORD: &str = "password";

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct Backend {
    pub tickets: BTreeMap<i64, Value>,
    pub users: BTreeMap<i64, Value>,
    pub next_ticket_id: i64,
    pub session_user: Option<i64>,

    /// Serve `GET /api/Usuarios/{id}`; answer 405 otherwise.
    pub user_by_id: bool,

    /// Answer writes with an empty 204 instead of the record.
    pub acknowledge_writes: bool,

    /// Answer with camelCase keys instead of PascalCase.
    pub camel_case: bool,

    /// Fail every ticket read / write with this status.
    pub fail_reads: Option<StatusCode>,
    pub fail_writes: Option<StatusCode>,

    pub suggestion: Option<String>,
    pub requests: Vec<Recorded>,
}

impl Backend {
    pub fn seeded() -> Self {
        let users = [
            (1, "Ana Souza", "ana@corp.example", 1, "Analyst"),
            (2, "Bruno Lima", "bruno@corp.example", 2, "Technician"),
            (3, "Carla Dias", "carla@corp.example", 3, "IT Manager"),
            (7, "Diego Rocha", "diego@corp.example", 1, "Buyer"),
        ]
        .into_iter()
        .map(|(id, name, email, role, job)| {
            let user = json!({
                "Id": id,
                "Nome": name,
                "Email": email,
                "Permissao": role,
                "Telefone": null,
                "Cargo": job,
            });
            (id, user)
        })
        .collect();

        Self {
            users,
            next_ticket_id: 100,
            user_by_id: true,
            ..Self::default()
        }
    }

    fn render(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) if self.camel_case => Value::Object(
                map.iter()
                    .map(|(k, v)| (camel(k), v.clone()))
                    .collect::<Map<_, _>>(),
            ),
            other => other.clone(),
        }
    }

    fn record(
        &mut self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Option<Value>,
    ) -> Option<String> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned);
        self.requests.push(Recorded {
            method,
            uri: uri.to_string(),
            bearer: bearer.clone(),
            body,
        });
        bearer
    }

    /// Records the request and checks its bearer token.
    fn enter(
        &mut self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Option<Value>,
    ) -> Result<(), Response> {
        match self.record(method, uri, headers, body).as_deref() {
            Some(TOKEN) => Ok(()),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Token inválido ou expirado"})),
            )
                .into_response()),
        }
    }
}

fn camel(key: &str) -> String {
    let mut chars = key.chars();
    chars
        .next()
        .map(|c| c.to_lowercase().chain(chars).collect())
        .unwrap_or_default()
}

type Shared = Arc<Mutex<Backend>>;

pub struct FakeApi {
    pub url: String,
    backend: Shared,
}

impl FakeApi {
    pub async fn start() -> Self {
        Self::with(Backend::seeded()).await
    }

    pub async fn with(backend: Backend) -> Self {
        let backend = Arc::new(Mutex::new(backend));
        let app = Router::new()
            .route("/api/Auth/login", post(login))
            .route("/api/Chamados", get(list_tickets).post(add_ticket))
            .route(
                "/api/Chamados/:id",
                get(get_ticket).put(edit_ticket).delete(delete_ticket),
            )
            .route("/api/Usuarios", get(list_users))
            .route("/api/Usuarios/:id", get(get_user).put(edit_user))
            .route("/api/gemini/sugerir-resposta", post(suggest))
            .route("/slow", get(slow))
            .with_state(Arc::clone(&backend));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server failed");
        });

        Self { url, backend }
    }

    pub fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.backend().requests.clone()
    }

    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::PUT)
            .collect()
    }

    pub fn client(&self, dir: &TempDir) -> Client {
        client(&self.url, dir)
    }

    /// Client already holding the token the API accepts.
    pub async fn logged_in(&self, dir: &TempDir) -> Client {
        tokens(dir).save(TOKEN).await;
        self.backend().session_user = Some(2);
        self.client(dir)
    }
}

pub fn tokens(dir: &TempDir) -> TokenStore {
    TokenStore::new(dir.path().join("token"))
}

pub fn client(url: &str, dir: &TempDir) -> Client {
    let api = config::Api {
        base_url: url.to_owned(),
        ..config::Api::default()
    };
    let tokens = tokens(dir);
    Client::new(
        Gateway::new(&api, tokens.clone()),
        tokens,
        Arc::new(DegradedStore::seeded()),
    )
}

/// Address nothing listens on.
pub fn unreachable_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn user(id: i64, role: Role) -> User {
    User {
        id: user::Id::from(id),
        name: format!("user {id}"),
        email: format!("user{id}@corp.example"),
        role,
        phone: None,
        job_title: String::new(),
    }
}

pub fn collaborator() -> User {
    user(1, Role::Collaborator)
}

pub fn support() -> User {
    user(2, Role::Support)
}

async fn login(
    State(backend): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut b = backend.lock().unwrap();
    b.record(Method::POST, &uri, &headers, Some(body.clone()));

    let user = b
        .users
        .values()
        .find(|u| u["Email"] == body["Email"])
        .filter(|_| body["Senha"] == PASSWORD)
        .cloned();
    match user {
        Some(user) => {
            b.session_user = user["Id"].as_i64();
            Json(json!({"Token": TOKEN, "Usuario": b.render(&user)}))
                .into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Email ou senha inválidos"})),
        )
            .into_response(),
    }
}

async fn list_tickets(
    State(backend): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) = b.enter(Method::GET, &uri, &headers, None) {
        return rejection;
    }
    if let Some(status) = b.fail_reads {
        return (status, Json(json!({"message": "Erro interno"})))
            .into_response();
    }
    // Filters are ignored on purpose: the client must apply them anyway.
    let tickets = b.tickets.values().map(|t| b.render(t)).collect();
    Json(Value::Array(tickets)).into_response()
}

async fn add_ticket(
    State(backend): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) =
        b.enter(Method::POST, &uri, &headers, Some(body.clone()))
    {
        return rejection;
    }
    if let Some(status) = b.fail_writes {
        return (status, Json(json!({"message": "Erro interno"})))
            .into_response();
    }

    let id = b.next_ticket_id;
    b.next_ticket_id += 1;
    let mut ticket = body;
    let record = ticket.as_object_mut().unwrap();
    record.insert("Id".into(), json!(id));
    record.insert("TecnicoResponsavelId".into(), Value::Null);
    record.insert("DataAbertura".into(), json!("2024-05-01T08:00:00"));
    record.insert("DataFechamento".into(), Value::Null);
    record.insert("Solucao".into(), Value::Null);
    b.tickets.insert(id, ticket.clone());

    (StatusCode::CREATED, Json(b.render(&ticket))).into_response()
}

async fn get_ticket(
    State(backend): State<Shared>,
    Path(id): Path<i64>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) = b.enter(Method::GET, &uri, &headers, None) {
        return rejection;
    }
    if let Some(status) = b.fail_reads {
        return (status, Json(json!({"message": "Erro interno"})))
            .into_response();
    }
    match b.tickets.get(&id) {
        Some(ticket) => Json(b.render(ticket)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Chamado não encontrado"})),
        )
            .into_response(),
    }
}

async fn edit_ticket(
    State(backend): State<Shared>,
    Path(id): Path<i64>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) =
        b.enter(Method::PUT, &uri, &headers, Some(body.clone()))
    {
        return rejection;
    }
    if let Some(status) = b.fail_writes {
        return (status, Json(json!({"message": "Erro interno"})))
            .into_response();
    }
    let acknowledge = b.acknowledge_writes;
    let Some(ticket) = b.tickets.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let record = ticket.as_object_mut().unwrap();
    for (k, v) in body.as_object().unwrap() {
        record.insert(k.clone(), v.clone());
    }
    let ticket = ticket.clone();

    if acknowledge {
        StatusCode::NO_CONTENT.into_response()
    } else {
        Json(b.render(&ticket)).into_response()
    }
}

async fn delete_ticket(
    State(backend): State<Shared>,
    Path(id): Path<i64>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) = b.enter(Method::DELETE, &uri, &headers, None) {
        return rejection;
    }
    b.tickets.remove(&id);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_users(
    State(backend): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) = b.enter(Method::GET, &uri, &headers, None) {
        return rejection;
    }
    // .NET reference-handling envelope.
    let users = b.users.values().map(|u| b.render(u)).collect::<Vec<_>>();
    Json(json!({"$id": "1", "$values": users})).into_response()
}

/// `{id}` is either a user id or `meu-perfil`.
fn resolve_user(b: &Backend, id: &str) -> Option<i64> {
    match id {
        "meu-perfil" => b.session_user,
        id => id.parse().ok(),
    }
}

async fn get_user(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) = b.enter(Method::GET, &uri, &headers, None) {
        return rejection;
    }
    if id != "meu-perfil" && !b.user_by_id {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    match resolve_user(&b, &id).and_then(|id| b.users.get(&id)) {
        Some(user) => Json(b.render(user)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn edit_user(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut b = backend.lock().unwrap();
    if let Err(rejection) =
        b.enter(Method::PUT, &uri, &headers, Some(body.clone()))
    {
        return rejection;
    }
    if id == "alterar-senha" {
        return StatusCode::NO_CONTENT.into_response();
    }
    let Some(id) = resolve_user(&b, &id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(user) = b.users.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let record = user.as_object_mut().unwrap();
    for (k, v) in body.as_object().unwrap() {
        if k != "NovaSenha" {
            record.insert(k.clone(), v.clone());
        }
    }
    let user = user.clone();
    Json(b.render(&user)).into_response()
}

async fn suggest(
    State(backend): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut b = backend.lock().unwrap();
    b.record(Method::POST, &uri, &headers, Some(body));
    match b.suggestion.clone() {
        Some(text) => Json(json!({"sugestao": text})).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "Serviço indisponível"})),
        )
            .into_response(),
    }
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK.into_response()
}

pub fn new_ticket(title: &str, requester: i64) -> NewTicket {
    NewTicket {
        title: title.to_owned(),
        description: format!("{title}, please help"),
        kind: "Hardware".to_owned(),
        priority: Priority::High,
        requester: user::Id::from(requester),
    }
}

/// Transport answering from a fixed set of records, keyed by path, with
/// switchable failures. Reads answer at once; writes can be held on `gate`.
#[derive(Default)]
pub struct Scripted {
    pub records: Mutex<HashMap<String, Value>>,
    pub puts: AtomicUsize,
    pub gate: Option<Arc<Notify>>,

    /// Every `PUT` fails as unreachable.
    pub fail_writes: bool,

    /// Reads fail as unreachable once a `PUT` went through.
    pub fail_reads_after_write: bool,

    /// Accepted writes answer with a bare acknowledgement.
    pub acknowledge_writes: bool,
}

impl Scripted {
    pub fn with(path: impl Into<String>, record: Value) -> Self {
        Self {
            records: Mutex::new(HashMap::from([(path.into(), record)])),
            ..Self::default()
        }
    }

    pub fn record(&self, path: &str) -> Value {
        self.records.lock().unwrap()[path].clone()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn client(self, dir: &TempDir) -> Client<Self> {
        Client::new(self, tokens(dir), Arc::new(DegradedStore::seeded()))
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn send(&self, request: Request) -> Result<Value, Error> {
        let unreachable = || Error::Connectivity("connection refused".into());
        match request.method.as_str() {
            "GET" => {
                if self.fail_reads_after_write && self.puts() > 0 {
                    return Err(unreachable());
                }
                self.records
                    .lock()
                    .unwrap()
                    .get(&request.path)
                    .cloned()
                    .ok_or_else(|| Error::Remote {
                        status: 404,
                        message: "not found".into(),
                    })
            }
            "PUT" => {
                self.puts.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                if self.fail_writes {
                    return Err(unreachable());
                }
                let mut records = self.records.lock().unwrap();
                let record = records
                    .get_mut(&request.path)
                    .and_then(Value::as_object_mut)
                    .unwrap();
                for (k, v) in request.body.unwrap().as_object().unwrap() {
                    record.insert(k.clone(), v.clone());
                }
                Ok(if self.acknowledge_writes {
                    json!({"message": ACKNOWLEDGED})
                } else {
                    Value::Object(record.clone())
                })
            }
            method => panic!("unexpected {method} {}", request.path),
        }
    }
}

/// Remote ticket record, open and unassigned.
pub fn remote_ticket(id: i64, title: &str) -> Value {
    json!({
        "Id": id,
        "Titulo": title,
        "Descricao": "Reported by phone",
        "Tipo": "Facilities",
        "Prioridade": 3,
        "Status": 1,
        "SolicitanteId": 7,
        "TecnicoResponsavelId": null,
        "DataAbertura": "2024-05-02T07:30:00",
    })
}
