use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wavecore::{FlowError, Value, Workflow, WorkflowId};
use waveruntime::{FlowRuntime, RuntimeConfig};

struct AppState {
    runtime: Arc<FlowRuntime>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
}

/// Body of an execute call. An empty body runs with a null payload.
#[derive(Debug, Default, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WorkflowResponse {
    id: Uuid,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    waves: Option<Vec<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_execute_request(body: &[u8]) -> Result<ExecuteRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExecuteRequest::default());
    }
    serde_json::from_slice(body)
}

fn not_found(workflow_id: Uuid) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: format!("Workflow {} not found", workflow_id),
    })
}

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "wave"
    }))
}

/// Summaries only; fetch a single workflow for its full graph
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let workflows = data.workflows.read().await;
    let workflow_list: Vec<_> = workflows
        .values()
        .map(|w| {
            serde_json::json!({
                "id": w.id,
                "name": w.name,
                "description": w.description,
                "nodes": w.nodes.len(),
                "edges": w.edges.len(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(workflow_list))
}

/// Store a workflow. Invalid graphs are rejected up front.
#[post("/api/workflows")]
async fn create_workflow(
    data: web::Data<AppState>,
    workflow: web::Json<Workflow>,
) -> ActixResult<impl Responder> {
    let workflow = workflow.into_inner();
    let workflow_id = workflow.id;

    if let Err(e) = data.runtime.plan(&workflow) {
        warn!("Rejected workflow {}: {}", workflow_id, e);
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        }));
    }

    info!("Creating workflow: {} ({})", workflow.name, workflow_id);
    data.workflows.write().await.insert(workflow_id, workflow);

    Ok(HttpResponse::Created().json(WorkflowResponse {
        id: workflow_id,
        message: "Workflow created successfully".to_string(),
    }))
}

#[get("/api/workflows/{id}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let workflows = data.workflows.read().await;

    match workflows.get(&workflow_id) {
        Some(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        None => Ok(not_found(workflow_id)),
    }
}

#[actix_web::delete("/api/workflows/{id}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let mut workflows = data.workflows.write().await;

    match workflows.remove(&workflow_id) {
        Some(_) => {
            info!("Deleted workflow: {}", workflow_id);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Workflow deleted successfully"
            })))
        }
        None => Ok(not_found(workflow_id)),
    }
}

/// Execute a stored workflow and return its run result
#[post("/api/workflows/{id}/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let request = match parse_execute_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected execute body for {}: {}", workflow_id, e);
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("invalid request body: {}", e),
            }));
        }
    };
    let payload = Value::from(request.payload);

    // Snapshot: edits made while the run is in flight do not reach it
    let workflow = match data.workflows.read().await.get(&workflow_id) {
        Some(workflow) => workflow.clone(),
        None => return Ok(not_found(workflow_id)),
    };

    info!("Executing workflow: {}", workflow_id);

    match data.runtime.execute(&workflow, payload).await {
        Ok(result) => {
            info!(
                "Workflow {} finished as {:?}",
                workflow_id, result.overall_status
            );
            Ok(HttpResponse::Ok().json(result))
        }
        Err(FlowError::Validation(e)) => Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        })),
        Err(e) => {
            error!("Workflow {} execution failed: {}", workflow_id, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// Validate a workflow without storing it
#[post("/api/workflows/validate")]
async fn validate_workflow(
    data: web::Data<AppState>,
    workflow: web::Json<Workflow>,
) -> ActixResult<impl Responder> {
    let response = match data.runtime.plan(&workflow) {
        Ok(plan) => ValidationResponse {
            valid: true,
            waves: Some(plan.wave_ids()),
            error: None,
        },
        Err(e) => ValidationResponse {
            valid: false,
            waves: None,
            error: Some(e.to_string()),
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Streams every run event as a JSON text frame. Lagging clients lose the
/// overflow and stay connected.
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("WebSocket client lagged, dropped {} events", n);
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// List available node types with their config schema
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.runtime.registry().list()))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting Wave Server");

    let config = RuntimeConfig::from_env();
    info!(
        "Runtime: max {} parallel nodes, event buffer {}",
        config.max_parallel_nodes, config.event_buffer_size
    );

    let app_state = web::Data::new(AppState {
        runtime: Arc::new(FlowRuntime::with_config(config)),
        workflows: Arc::new(RwLock::new(HashMap::new())),
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
            .service(validate_workflow)
            .service(list_workflows)
            .service(create_workflow)
            .service(get_workflow)
            .service(delete_workflow)
            .service(execute_workflow)
            .service(websocket_events)
            .service(list_node_types)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use wavecore::{NodeType, WorkflowBuilder};

    fn state_with(workflow: Workflow) -> web::Data<AppState> {
        let mut workflows = HashMap::new();
        workflows.insert(workflow.id, workflow);
        web::Data::new(AppState {
            runtime: Arc::new(FlowRuntime::with_config(RuntimeConfig::default())),
            workflows: Arc::new(RwLock::new(workflows)),
        })
    }

    fn webhook_only() -> (Workflow, String) {
        let mut builder = WorkflowBuilder::new("hook");
        let hook = builder.add_node(NodeType::Webhook);
        (builder.build(), hook)
    }

    #[actix_web::test]
    async fn test_execute_rejects_malformed_body() {
        let (workflow, _) = webhook_only();
        let id = workflow.id;
        let app = test::init_service(
            App::new().app_data(state_with(workflow)).service(execute_workflow),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/execute", id))
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"payload\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid request body"));
    }

    #[actix_web::test]
    async fn test_execute_accepts_empty_body() {
        let (workflow, hook) = webhook_only();
        let id = workflow.id;
        let app = test::init_service(
            App::new().app_data(state_with(workflow)).service(execute_workflow),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/execute", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["overallStatus"], "succeeded");
        assert_eq!(body["nodes"][hook.as_str()]["status"], "succeeded");
    }

    #[actix_web::test]
    async fn test_execute_passes_payload_to_trigger() {
        let (workflow, hook) = webhook_only();
        let id = workflow.id;
        let app = test::init_service(
            App::new().app_data(state_with(workflow)).service(execute_workflow),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/execute", id))
            .set_json(serde_json::json!({ "payload": { "order": 42 } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["nodes"][hook.as_str()]["output"], serde_json::json!({ "order": 42 }));
    }

    #[actix_web::test]
    async fn test_execute_unknown_workflow_is_not_found() {
        let (workflow, _) = webhook_only();
        let app = test::init_service(
            App::new().app_data(state_with(workflow)).service(execute_workflow),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/execute", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
