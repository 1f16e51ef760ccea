use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use area_index::AreaIndex;

use crate::config::ServerConfig;
use crate::error::{CoreError, CoreResult};
use crate::server::error::ApiError;
use crate::storage::SharedStorage;

pub mod area;
pub mod auth;
pub mod cdn;
pub mod error;
pub mod forum;
pub mod inventory;
pub mod payload;
pub mod person;
pub mod placement;
pub mod system;
pub mod thing;

/// Shared handler state: the document store and the area index.
pub struct ServerState {
    pub(crate) storage: SharedStorage,
    pub(crate) index: Arc<AreaIndex>,
}

impl ServerState {
    pub fn new(storage: SharedStorage, index: Arc<AreaIndex>) -> Self {
        Self { storage, index }
    }
}

/// The API listener plus the two CDN listeners. Dropping the server stops
/// all three.
pub struct Server {
    api_addr: SocketAddr,
    thingdefs_addr: SocketAddr,
    areabundles_addr: SocketAddr,
    shutdown: Vec<oneshot::Sender<()>>,
}

impl Server {
    pub async fn start(state: Arc<ServerState>, config: &ServerConfig) -> CoreResult<Self> {
        let mut shutdown = Vec::with_capacity(3);

        let api_addr = serve(
            "API",
            api_router(state.clone()),
            &config.api_addr(),
            &mut shutdown,
        )
        .await?;
        let thingdefs_addr = serve(
            "THINGDEFS",
            cdn::thingdefs_router(state.clone()),
            &config.thingdefs_addr(),
            &mut shutdown,
        )
        .await?;
        let areabundles_addr = serve(
            "AREABUNDLES",
            cdn::areabundles_router(state),
            &config.areabundles_addr(),
            &mut shutdown,
        )
        .await?;

        Ok(Server {
            api_addr,
            thingdefs_addr,
            areabundles_addr,
            shutdown,
        })
    }

    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    pub fn thingdefs_addr(&self) -> SocketAddr {
        self.thingdefs_addr
    }

    pub fn areabundles_addr(&self) -> SocketAddr {
        self.areabundles_addr
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        let mut failed = false;
        for sender in self.shutdown.drain(..) {
            failed |= sender.send(()).is_err();
        }
        if failed {
            Err("failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Routes served on the main API port.
pub fn api_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/p", post(system::keepalive))
        .route("/index/status", get(system::index_status))
        .route("/repair-home-area", get(area::repair_home_area))
        .route("/auth/start", post(auth::start))
        .route("/person/registerusagemode", post(system::acknowledge))
        .route("/ach/reg", post(system::acknowledge))
        .route("/extras/startedittoolstrial", post(system::start_edit_tools_trial))
        .route("/user/setName", post(person::set_name))
        .route("/gift/getreceived", post(person::received_gifts))
        .route("/person/info", post(person::info))
        .route("/person/infobasic", post(person::info_basic))
        .route("/person/updatesetting", post(person::update_setting))
        .route("/person/updateattachment", post(person::update_attachment))
        .route("/inventory/save", post(inventory::save))
        .route("/inventory/update", post(inventory::update))
        .route("/inventory/delete", post(inventory::delete))
        .route("/inventory/move", post(inventory::move_item))
        .route("/inventory/:page", get(inventory::page))
        .route("/forum/forum/:id", get(forum::forum))
        .route("/forum/thread/:id", get(forum::thread))
        .route("/area", post(area::create))
        .route("/area/load", post(area::load))
        .route("/area/info", post(area::info))
        .route("/area/save", post(area::save))
        .route("/area/getsubareas", post(area::subareas))
        .route("/area/search", post(area::search))
        .route("/area/lists", post(area::lists))
        .route("/area/visit", post(area::visit))
        .route("/area/updatesettings", post(area::update_settings))
        .route("/placement/info", post(placement::info))
        .route("/placement/metadata", post(placement::info))
        .route("/placement/list", post(placement::list))
        .route("/placement/new", post(placement::create))
        .route("/placement/update", post(placement::update))
        .route("/placement/save", post(placement::save))
        .route("/placement/delete", post(placement::delete))
        .route("/placement/duplicate", post(placement::duplicate))
        .route("/thing", post(thing::create))
        .route("/thing/rename", post(thing::rename))
        .route("/thing/updateInfo", post(thing::update_info))
        .route("/thing/search", post(thing::search))
        .route("/thing/fixmissinginfo", post(thing::fix_missing_info))
        .route("/thing/info", post(thing::info))
        .route("/thing/info/:id", get(thing::raw_info))
        .route("/thing/def/:id", get(thing::raw_definition))
        .route("/thing/sl/tdef/:id", get(thing::raw_definition))
        .route("/thing/definition", post(thing::definition))
        .route("/thing/definitionAreaBundle", post(thing::definition))
        .route("/thing/gettags", post(thing::tags))
        .route("/thing/flagStatus", post(thing::flag_status))
        .route("/thing/getflag", post(thing::flag))
        .route("/thing/topby", post(thing::top_by))
        .route("/thing/topCreatedByPerson", post(thing::top_created_by_person))
        .with_state(state)
        .layer(middleware::from_fn_with_state("API", log_request))
        .layer(cors())
}

pub(crate) fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Serves a stored document as-is, or `{}` with 404 when it is missing
/// or its key is not a valid storage key.
pub(crate) async fn stored_document(
    state: &ServerState,
    keys: &[&str],
) -> Result<Response, ApiError> {
    let document = match state.storage.read(keys).await {
        Ok(document) => document,
        Err(CoreError::InvalidInput(_)) => None,
        Err(error) => return Err(error.into()),
    };
    match document {
        Some(document) => Ok(Json(document).into_response()),
        None => {
            tracing::warn!("/{} not found", keys.join("/"));
            Ok((StatusCode::NOT_FOUND, Json(json!({}))).into_response())
        }
    }
}

/// One log line per request, tagged with the listener it arrived on.
pub(crate) async fn log_request(
    State(server): State<&'static str>,
    request: Request,
    next: Next,
) -> Response {
    tracing::info!("{server} {} {}", request.method(), request.uri());
    next.run(request).await
}

async fn serve(
    name: &'static str,
    app: Router,
    addr: &str,
    shutdown: &mut Vec<oneshot::Sender<()>>,
) -> CoreResult<SocketAddr> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|error| CoreError::Internal(format!("failed to bind {name} on {addr}: {error}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|error| CoreError::Internal(error.to_string()))?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(error) = result {
            tracing::error!("{name} server stopped: {error}");
        }
    });

    tracing::info!("{name} server listening on {local_addr}");
    shutdown.push(shutdown_tx);
    Ok(local_addr)
}
