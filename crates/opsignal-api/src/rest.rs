//! REST API implementation
//!
//! Routes:
//! - `POST /api/v1/signals` — agent-authenticated batch ingestion
//! - `GET /api/v1/signals` — session-authenticated filtered retrieval
//! - `GET /api/v1/signals/summary` — grouped aggregates
//! - `GET /api/v1/signals/timeseries` — time-bucketed counts
//!
//! Read paths always scope the filter to the authenticated session's
//! company id; whatever `customer_id` the query string carried is discarded.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use serde::Deserialize;
use tracing::info;

use opsignal_common::config::ServerConfig;
use opsignal_common::error::{Error, Result, ValidationError};
use opsignal_common::filter::FilterParams;
use opsignal_common::types::{Granularity, SignalPayload};
use opsignal_ingest::IngestPipeline;
use opsignal_query::QueryEngine;
use opsignal_security::SecurityManager;

/// REST API server
#[derive(Clone)]
pub struct RestServer {
    config: ServerConfig,
    pipeline: Arc<IngestPipeline>,
    query: Arc<QueryEngine>,
    security: Arc<SecurityManager>,
}

impl RestServer {
    /// Create a new REST server
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        pipeline: Arc<IngestPipeline>,
        query: Arc<QueryEngine>,
        security: Arc<SecurityManager>,
    ) -> Self {
        Self {
            config: config.clone(),
            pipeline,
            query,
            security,
        }
    }

    /// Build CORS middleware based on configuration
    fn build_cors(origins: &[String]) -> Cors {
        // If "*" is in the list or list is empty, use permissive mode (development only)
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            tracing::warn!("CORS is configured with wildcard origin - not recommended for production");
            return Cors::permissive();
        }

        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        for origin in origins {
            cors = cors.allowed_origin(origin);
        }

        cors
    }

    /// Run the REST server
    pub async fn run(&self) -> Result<()> {
        let pipeline = self.pipeline.clone();
        let query = self.query.clone();
        let security = self.security.clone();
        let cors_origins = self.config.cors_origins.clone();

        info!("Starting REST API server on {}:{}", self.config.host, self.config.port);

        HttpServer::new(move || {
            let cors = Self::build_cors(&cors_origins);

            App::new()
                .app_data(json_config())
                .app_data(web::Data::new(pipeline.clone()))
                .app_data(web::Data::new(query.clone()))
                .app_data(web::Data::new(security.clone()))
                .wrap(cors)
                .wrap(middleware::Compress::default())
                .wrap(middleware::Logger::default())
                .route("/health", web::get().to(health_check))
                .route("/health/live", web::get().to(liveness))
                .route("/health/ready", web::get().to(readiness))
                .route("/metrics", web::get().to(metrics))
                .service(
                    web::scope("/api/v1")
                        .route("/signals", web::post().to(post_signals))
                        .route("/signals", web::get().to(get_signals))
                        .route("/signals/summary", web::get().to(get_signal_summary))
                        .route("/signals/timeseries", web::get().to(get_signal_timeseries)),
                )
        })
        .workers(self.config.workers)
        .bind(format!("{}:{}", self.config.host, self.config.port))?
        .run()
        .await?;

        Ok(())
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        info!("Shutting down REST API server");
    }
}

/// JSON extractor config: a body that does not decode into the expected
/// batch shape is rejected wholesale with the API's own error body, before
/// any handler (and hence any persistence) runs.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = error_response(&Error::Validation(ValidationError::MalformedBatch(
            err.to_string(),
        )));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "alive"}))
}

async fn readiness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ready"}))
}

async fn metrics() -> HttpResponse {
    let metrics = opsignal_common::metrics::export_prometheus();
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(metrics)
}

/// `POST /api/v1/signals` — webhook for agents. The Authorization header
/// carries the agent API key; the decoded batch runs through the pipeline.
/// A malformed body never reaches the store: the JSON extractor rejects it
/// with 400 before this handler runs.
async fn post_signals(
    req: HttpRequest,
    security: web::Data<Arc<SecurityManager>>,
    pipeline: web::Data<Arc<IngestPipeline>>,
    batch: web::Json<Vec<SignalPayload>>,
) -> HttpResponse {
    let identity = match security.authenticate_agent(raw_header(&req)) {
        Ok(identity) => identity,
        Err(e) => return error_response(&e),
    };

    let accepted = pipeline.ingest(&identity, batch.into_inner()).await;
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "accepted": accepted,
    }))
}

/// `GET /api/v1/signals` — filtered retrieval for dashboards
async fn get_signals(
    req: HttpRequest,
    security: web::Data<Arc<SecurityManager>>,
    query_engine: web::Data<Arc<QueryEngine>>,
    params: web::Query<FilterParams>,
) -> HttpResponse {
    let filter = match scoped_filter(&req, &security, &params) {
        Ok(filter) => filter,
        Err(e) => return error_response(&e),
    };

    match query_engine.query(filter).await {
        Ok(signals) => HttpResponse::Ok().json(signals),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/v1/signals/summary` — grouped aggregate stats
async fn get_signal_summary(
    req: HttpRequest,
    security: web::Data<Arc<SecurityManager>>,
    query_engine: web::Data<Arc<QueryEngine>>,
    params: web::Query<FilterParams>,
) -> HttpResponse {
    let filter = match scoped_filter(&req, &security, &params) {
        Ok(filter) => filter,
        Err(e) => return error_response(&e),
    };

    match query_engine.summary(filter).await {
        Ok(groups) => HttpResponse::Ok().json(groups),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct TimeseriesParams {
    agent_id: Option<String>,
    customer_id: Option<String>,
    protocol: Option<String>,
    operation: Option<String>,
    from: Option<String>,
    to: Option<String>,
    bucket: Option<String>,
}

impl TimeseriesParams {
    fn filter_params(&self) -> FilterParams {
        FilterParams {
            agent_id: self.agent_id.clone(),
            customer_id: self.customer_id.clone(),
            protocol: self.protocol.clone(),
            operation: self.operation.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

/// `GET /api/v1/signals/timeseries` — time-bucketed counts
async fn get_signal_timeseries(
    req: HttpRequest,
    security: web::Data<Arc<SecurityManager>>,
    query_engine: web::Data<Arc<QueryEngine>>,
    params: web::Query<TimeseriesParams>,
) -> HttpResponse {
    let granularity = match Granularity::parse(params.bucket.as_deref()) {
        Ok(g) => g,
        Err(e) => return error_response(&e),
    };

    let filter = match scoped_filter(&req, &security, &params.filter_params()) {
        Ok(filter) => filter,
        Err(e) => return error_response(&e),
    };

    match query_engine.timeseries(filter, granularity).await {
        Ok(buckets) => HttpResponse::Ok().json(buckets),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Authenticate the session and build the tenant-scoped filter. The
/// session's company id always wins over any client-supplied customer id.
fn scoped_filter(
    req: &HttpRequest,
    security: &SecurityManager,
    params: &FilterParams,
) -> Result<opsignal_common::filter::SignalFilter> {
    let session = security.authenticate_session(bearer_token(req))?;
    Ok(params.build()?.scoped_to(&session.company_id))
}

fn raw_header(req: &HttpRequest) -> &str {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn bearer_token(req: &HttpRequest) -> &str {
    raw_header(req).strip_prefix("Bearer ").unwrap_or("")
}

fn error_response(error: &Error) -> HttpResponse {
    let status = StatusCode::from_u16(error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(serde_json::json!({
        "error": error.to_string(),
    }))
}
