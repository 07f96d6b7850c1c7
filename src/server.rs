use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::analyzer::BillingAnalyzer;
use crate::cli::ServeArgs;
use crate::codes::CodeSearch;
use crate::rules::ncci::modifier_guidance;

#[derive(Clone)]
struct AppState {
    analyzer: Arc<BillingAnalyzer>,
}

pub async fn run(opts: ServeArgs) -> anyhow::Result<()> {
    let data_dir = PathBuf::from(&opts.data_dir);
    let analyzer = BillingAnalyzer::load(&data_dir)
        .with_context(|| format!("load reference data from {}", data_dir.display()))?;

    let state = AppState {
        analyzer: Arc::new(analyzer),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/health", get(api_health))
        .route("/api/analyze", post(api_analyze))
        .route("/api/codes/search", get(api_code_search))
        .route("/api/codes/:code", get(api_code_detail))
        .route("/api/modifiers/:modifier", get(api_modifier_detail))
        .route("/api/scenarios", get(api_scenarios))
        .route("/api/scenarios/:name", get(api_scenario_detail))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", opts.host, opts.port)
        .parse()
        .context("parse host:port")?;

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    scenarios_loaded: usize,
}

async fn api_health(State(st): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        scenarios_loaded: st.analyzer.scenarios().list_scenarios().len(),
    })
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    note: String,
}

async fn api_analyze(
    State(st): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if req.note.trim().len() < 10 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "note must be at least 10 characters",
        )
            .into_response();
    }
    match st.analyzer.analyze(&req.note) {
        Ok(result) => Json(result).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

async fn api_code_detail(
    State(st): State<AppState>,
    AxumPath(code): AxumPath<String>,
) -> impl IntoResponse {
    match st.analyzer.code_db().get_code(&code) {
        Some(info) => Json(info.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown code {code}")).into_response(),
    }
}

async fn api_code_search(
    State(st): State<AppState>,
    Query(search): Query<CodeSearch>,
) -> impl IntoResponse {
    let hits: Vec<_> = st
        .analyzer
        .code_db()
        .search_codes(&search)
        .into_iter()
        .cloned()
        .collect();
    Json(hits)
}

#[derive(Debug, Serialize)]
struct ModifierResponse {
    modifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<crate::codes::ModifierInfo>,
    guidance_name: String,
    use_when: String,
    document: String,
    audit_risk: String,
}

async fn api_modifier_detail(
    State(st): State<AppState>,
    AxumPath(modifier): AxumPath<String>,
) -> impl IntoResponse {
    let guidance = modifier_guidance(&modifier);
    Json(ModifierResponse {
        modifier: modifier.trim_start_matches('-').to_string(),
        reference: st.analyzer.code_db().get_modifier(&modifier).cloned(),
        guidance_name: guidance.name.to_string(),
        use_when: guidance.use_when.to_string(),
        document: guidance.document.to_string(),
        audit_risk: guidance.audit_risk.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct ScenarioListResponse {
    scenarios: Vec<String>,
}

async fn api_scenarios(State(st): State<AppState>) -> impl IntoResponse {
    Json(ScenarioListResponse {
        scenarios: st.analyzer.scenarios().list_scenarios().to_vec(),
    })
}

#[derive(Debug, Serialize)]
struct ScenarioResponse {
    name: String,
    content: String,
}

async fn api_scenario_detail(
    State(st): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> impl IntoResponse {
    match st.analyzer.scenarios().scenario_content(&name) {
        Some(content) => Json(ScenarioResponse {
            name,
            content: content.to_string(),
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown scenario {name}")).into_response(),
    }
}
