//! In-memory stand-in for the TribeHR API.
//!
//! Serves the user directory as XML behind HTTP Basic auth, accepts
//! bracket-keyed form bodies (`user[name]=Jane`) for create and update, and
//! exposes unauthenticated helpers for transport tests: `/echo` reflects
//! the received request as JSON, `/redirect/{hops}` walks a redirect chain
//! of the given length and `/blob/{len}` answers with `len` bytes.
//!
//! [`run_tls`] serves the same routes over HTTPS with a self-signed
//! certificate for `localhost` and `127.0.0.1`.

use std::{
    collections::{BTreeMap, HashMap},
    io::{self, BufReader},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    ServerConfig,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tokio_rustls::TlsAcceptor;

pub const USERNAME: &str = "admin";
pub const API_KEY: &str = "secret";

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

const CERT_PEM: &[u8] = include_bytes!("../certs/localhost.crt");
const KEY_PEM: &[u8] = include_bytes!("../certs/localhost.key");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default)]
pub struct Directory {
    next_id: u64,
    users: BTreeMap<u64, User>,
}

pub type Db = Arc<RwLock<Directory>>;

/// What `/echo` saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Directory::default()));
    Router::new()
        .route("/users.xml", get(list_users).post(create_user))
        .route("/users/{file}", get(get_user).put(update_user).delete(delete_user))
        .route_layer(middleware::from_fn(require_auth))
        .route("/echo", any(echo))
        .route("/redirect/{hops}", get(redirect))
        .route("/blob/{len}", get(blob))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Serve [`app`] over TLS until the listener fails.
///
/// Failed handshakes are logged and the connection dropped; a client that
/// rejects the self-signed certificate does not stop the server.
pub async fn run_tls(listener: TcpListener) -> Result<(), io::Error> {
    let acceptor = tls_acceptor()?;
    let app = app();
    loop {
        let (stream, peer) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::info!(%peer, "TLS handshake failed: {e}");
                    return;
                }
            };
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::info!(%peer, "connection closed with error: {e}");
            }
        });
    }
}

/// Acceptor for the bundled self-signed `localhost` certificate.
pub fn tls_acceptor() -> Result<TlsAcceptor, io::Error> {
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut BufReader::new(CERT_PEM)).collect::<Result<_, _>>()?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut BufReader::new(KEY_PEM))?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key in PEM data"))?;

    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(io::Error::other)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(io::Error::other)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Whether `headers` carry the mock account's Basic credentials.
pub fn authorized(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    decoded == format!("{USERNAME}:{API_KEY}").as_bytes()
}

async fn require_auth(request: Request, next: Next) -> Response {
    if authorized(request.headers()) {
        return next.run(request).await;
    }
    tracing::info!(path = %request.uri().path(), "rejected unauthenticated request");
    let mut response = xml(StatusCode::UNAUTHORIZED, error_xml("Authentication required"));
    if let Ok(value) = "Basic realm=\"TribeHR\"".parse() {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

async fn list_users(State(db): State<Db>) -> Response {
    let directory = db.read().await;
    let users: String = directory.users.values().map(user_xml).collect();
    xml(StatusCode::OK, document(&format!("<users>{users}</users>")))
}

async fn create_user(State(db): State<Db>, Form(fields): Form<HashMap<String, String>>) -> Response {
    let Some(name) = fields.get("user[name]").filter(|n| !n.is_empty()) else {
        return xml(StatusCode::UNPROCESSABLE_ENTITY, error_xml("Name can't be blank"));
    };

    let mut directory = db.write().await;
    directory.next_id += 1;
    let user = User {
        id: directory.next_id,
        name: name.clone(),
        email: fields.get("user[email]").cloned().unwrap_or_default(),
    };
    directory.users.insert(user.id, user.clone());
    tracing::info!(id = user.id, "created user");
    xml(StatusCode::CREATED, document(&user_xml(&user)))
}

async fn get_user(State(db): State<Db>, Path(file): Path<String>) -> Response {
    let Some(id) = parse_id(&file) else {
        return not_found();
    };
    match db.read().await.users.get(&id) {
        Some(user) => xml(StatusCode::OK, document(&user_xml(user))),
        None => not_found(),
    }
}

async fn update_user(
    State(db): State<Db>,
    Path(file): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let Some(id) = parse_id(&file) else {
        return not_found();
    };
    let mut directory = db.write().await;
    let Some(user) = directory.users.get_mut(&id) else {
        return not_found();
    };
    if let Some(name) = fields.get("user[name]") {
        user.name = name.clone();
    }
    if let Some(email) = fields.get("user[email]") {
        user.email = email.clone();
    }
    xml(StatusCode::OK, document(&user_xml(user)))
}

async fn delete_user(State(db): State<Db>, Path(file): Path<String>) -> Response {
    let Some(id) = parse_id(&file) else {
        return not_found();
    };
    match db.write().await.users.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<EchoedRequest> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(EchoedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn redirect(Path(hops): Path<u32>) -> Response {
    if hops == 0 {
        return xml(StatusCode::OK, document("<landed/>"));
    }
    Redirect::to(&format!("/redirect/{}", hops - 1)).into_response()
}

async fn blob(Path(len): Path<usize>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        vec![b'x'; len],
    )
        .into_response()
}

/// `"3.xml"` -> `3`.
fn parse_id(file: &str) -> Option<u64> {
    file.strip_suffix(".xml")?.parse().ok()
}

fn not_found() -> Response {
    xml(StatusCode::NOT_FOUND, error_xml("Record not found"))
}

fn xml(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

fn document(inner: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{inner}")
}

fn error_xml(message: &str) -> String {
    document(&format!("<errors><error>{}</error></errors>", escape(message)))
}

fn user_xml(user: &User) -> String {
    format!(
        "<user><id>{}</id><name>{}</name><email>{}</email></user>",
        user.id,
        escape(&user.name),
        escape(&user.email)
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
