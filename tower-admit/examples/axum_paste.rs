use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::FromRequest;
use axum::extract::Path;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use serde::Serialize;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_admit::Admission;
use tower_admit::AdmissionConfig;
use tower_admit::AdmitError;
use tower_admit::KeyExtractor;
use tower_admit::RealIp;
use tower_admit::ViewRecorder;
use tower_admit::ViewSink;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = r#"
limits:
  get_document:
    - { amount: 3, period: 1 }
    - { amount: 60, period: 60 }
  post_document:
    - { amount: 1, period: 2 }
    - { amount: 20, period: 3600 }
views:
  cool_down: 1800
  sweep_interval: 600
"#;

#[derive(Debug, Clone, Serialize)]
struct Document {
    key: String,
    views: u64,
    content: String,
}

#[derive(Debug, Deserialize)]
struct NewDocument {
    content: String,
}

#[derive(Serialize)]
struct Reply<T> {
    ok: bool,
    result: T,
}

#[derive(Default)]
struct Store {
    documents: Mutex<HashMap<String, Document>>,
}

impl ViewSink for Store {
    async fn increment_views(&self, key: &str) -> Result<(), BoxError> {
        let mut documents = self.documents.lock().map_err(|e| e.to_string())?;
        let document = documents
            .get_mut(key)
            .ok_or_else(|| format!("no document {key}"))?;
        document.views += 1;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    store: Arc<Store>,
    views: ViewRecorder<Store>,
}

#[derive(Serialize)]
struct Failure {
    ok: bool,
    error: &'static str,
}

fn not_found() -> Response {
    let body = Failure {
        ok: false,
        error: "DOCUMENT_NOT_FOUND",
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn get_document(
    State(app): State<AppState>,
    Path(key): Path<String>,
    request: Request,
) -> Response {
    let found = app
        .store
        .documents
        .lock()
        .ok()
        .and_then(|documents| documents.get(&key).cloned());

    match found {
        Some(document) => {
            if let Some(client) = RealIp.extract(&request) {
                app.views.record(&key, &client);
            }
            Json(Reply {
                ok: true,
                result: document,
            })
            .into_response()
        }
        None => not_found(),
    }
}

async fn post_document(
    State(app): State<AppState>,
    request: Request,
) -> Result<Response, Response> {
    let client = RealIp.extract(&request);
    let Json(new) = <Json<NewDocument> as FromRequest<()>>::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;

    let key: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let document = Document {
        key: key.clone(),
        views: 0,
        content: new.content,
    };
    app.store
        .documents
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())?
        .insert(key.clone(), document.clone());

    // The author's own read counts once.
    if let Some(client) = client {
        app.views.record(&key, &client);
    }

    Ok((
        StatusCode::CREATED,
        Json(Reply {
            ok: true,
            result: document,
        }),
    )
        .into_response())
}

/// Turns middleware failures into `{"ok":false,"error":...}` responses.
async fn handle_admit_error(err: BoxError) -> Response {
    AdmitError::from_boxed(err).into_response()
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AdmissionConfig::load(path)?,
        None => AdmissionConfig::from_yaml(DEFAULT_CONFIG)?,
    };
    let admission = Admission::from_config(&config);
    let _reaper = admission.spawn_reaper();

    let store = Arc::new(Store::default());
    let state = AppState {
        views: admission.recorder(Arc::clone(&store)),
        store,
    };

    let get_limit = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_admit_error))
        .layer(admission.layer("get_document")?)
        .map_err(BoxError::from);
    let post_limit = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_admit_error))
        .layer(admission.layer("post_document")?)
        .map_err(BoxError::from);

    let app = Router::new()
        .route(
            "/api/documents/{key}",
            get(get_document).route_layer(get_limit),
        )
        .route("/api/documents", post(post_document).route_layer(post_limit))
        .route("/api/ping", get(|| async { Json(Reply { ok: true, result: "pong" }) }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    println!("📡 Listening on http://127.0.0.1:3000");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
