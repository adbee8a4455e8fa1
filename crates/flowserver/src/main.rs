use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult};
use actix_ws::Message;
use flowcore::{ChannelSink, FlowError, GraphDef, GraphId, RunId, State};
use flowruntime::{GraphEngine, RuntimeConfig, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Lines buffered per WebSocket before sends start waiting on the client
const LOG_BUFFER: usize = 256;

/// Application state shared across handlers
struct AppState {
    engine: Arc<GraphEngine>,
}

/// Request body for starting a run
#[derive(Debug, Deserialize)]
struct RunRequest {
    graph_id: GraphId,
    #[serde(default)]
    initial_state: State,
}

#[derive(Debug, Serialize)]
struct CreateGraphResponse {
    graph_id: GraphId,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    run_id: RunId,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: &FlowError) -> HttpResponse {
    let body = ErrorResponse {
        error: e.to_string(),
    };
    if e.is_not_found() {
        HttpResponse::NotFound().json(body)
    } else {
        error!("Request failed: {}", e);
        HttpResponse::InternalServerError().json(body)
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowengine",
        "graphs": data.engine.store().graph_count(),
        "active_runs": data.engine.active_runs(),
    }))
}

/// Store a graph definition
#[post("/graph/create")]
async fn create_graph(
    data: web::Data<AppState>,
    def: web::Json<GraphDef>,
) -> ActixResult<impl Responder> {
    let graph = data.engine.create_graph(def.into_inner());

    Ok(HttpResponse::Ok().json(CreateGraphResponse {
        graph_id: graph.id.clone(),
    }))
}

/// Start a run; returns before the run completes
#[post("/graph/run")]
async fn run_graph(
    data: web::Data<AppState>,
    req: web::Json<RunRequest>,
) -> ActixResult<impl Responder> {
    let RunRequest {
        graph_id,
        initial_state,
    } = req.into_inner();

    match data.engine.start_run(&graph_id, initial_state) {
        Ok(run_id) => {
            info!("Started run {} of graph {}", run_id, graph_id);
            Ok(HttpResponse::Ok().json(RunResponse { run_id }))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// Current snapshot of a run
#[get("/graph/state/{run_id}")]
async fn graph_state(
    data: web::Data<AppState>,
    path: web::Path<RunId>,
) -> ActixResult<impl Responder> {
    match data.engine.get_run(&path.into_inner()) {
        Ok(run) => Ok(HttpResponse::Ok().json(run)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// WebSocket endpoint streaming one text frame per run log line
#[get("/ws/logs/{run_id}")]
async fn websocket_logs(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    path: web::Path<RunId>,
) -> ActixResult<HttpResponse> {
    let run_id = path.into_inner();
    if let Err(e) = data.engine.get_run(&run_id) {
        return Ok(error_response(&e));
    }

    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let store = Arc::clone(data.engine.store());
    let (sink, mut lines) = ChannelSink::channel(LOG_BUFFER);
    let subscription = store.subscribe(&run_id, Arc::new(sink));
    info!("WebSocket client subscribed to run {}", run_id);

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                // Log line from the run
                line = lines.recv() => {
                    let Some(line) = line else { break };
                    if session.text(line).await.is_err() {
                        break;
                    }
                }

                // Inbound frames are drained; only ping and close matter
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(other)) => debug!("Ignoring inbound frame: {:?}", other),
                    }
                }
            }
        }

        store.unsubscribe(&run_id, subscription);
        info!("WebSocket client unsubscribed from run {}", run_id);
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// List registered tools
#[get("/api/tools")]
async fn list_tools(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let registry = data.engine.registry();
    let tools: Vec<_> = registry
        .list_tools()
        .iter()
        .filter_map(|name| registry.get_metadata(name))
        .collect();

    Ok(HttpResponse::Ok().json(tools))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting Flow Engine Server");

    // Tools are registered before the first request is served
    let registry = ToolRegistry::new();
    flownodes::register_all(&registry);

    let engine = GraphEngine::with_registry(Arc::new(registry), RuntimeConfig::from_env());

    info!("✅ Engine initialized with standard tools");

    let app_state = web::Data::new(AppState {
        engine: Arc::new(engine),
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(create_graph)
            .service(run_graph)
            .service(graph_state)
            .service(websocket_logs)
            .service(list_tools)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
