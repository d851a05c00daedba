//! REST API layer: route handlers, extractors, DTOs, and router composition.
//!
//! Resource endpoints are mounted at the root. The OpenAPI document is
//! served at `/api-docs/openapi.json`, with Swagger UI at `/swagger-ui`
//! when the `swagger-ui` feature is enabled. Uploaded proof files are
//! served from the upload directory under their public URL prefix.

pub mod dto;
pub mod extract;
pub mod handlers;

use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "classifieds-gateway",
        description = "Listing view analytics and premium placement payments."
    ),
    paths(
        handlers::system::health_handler,
        handlers::views::record_view,
        handlers::views::listing_analytics,
        handlers::premium::list_tiers,
        handlers::premium::submit_payment,
        handlers::premium::my_payments,
        handlers::premium::listing_premium,
        handlers::admin::create_tier,
        handlers::admin::list_payments,
        handlers::admin::update_payment_status,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::service::RecordedView,
        crate::domain::ViewEvent,
        crate::domain::GeoLocation,
        crate::domain::AnalyticsReport,
        crate::domain::HourBucket,
        crate::domain::DayBucket,
        crate::domain::CountryCount,
        crate::domain::PremiumTier,
        crate::domain::NewPremiumTier,
        crate::domain::PremiumPayment,
        crate::domain::PaymentStatus,
        crate::domain::PaymentSummary,
        crate::domain::PremiumState,
        dto::UpdatePaymentStatusRequest,
        dto::PaymentSubmissionForm,
        handlers::system::HealthResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Views", description = "View recording and owner analytics"),
        (name = "Premium", description = "Tier catalogue and payment submission"),
        (name = "Admin", description = "Tier management and payment review"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT security scheme.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Where proof-of-payment uploads are stored and served.
#[derive(Debug, Clone)]
pub struct UploadRoutes {
    /// Directory uploaded files are written to and served from.
    pub dir: PathBuf,
    /// URL prefix of stored files. Only a local path such as `/uploads`
    /// is mounted; an absolute URL is assumed to be served elsewhere.
    pub public_base_url: String,
    /// Largest accepted upload body in bytes.
    pub max_bytes: usize,
}

/// Builds the complete API router with all REST endpoints.
pub fn build_router(uploads: &UploadRoutes) -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::routes(uploads.max_bytes))
        .merge(handlers::system::routes())
        .merge(docs_router());

    match upload_mount_point(&uploads.public_base_url) {
        Some(mount) => router.nest_service(mount, ServeDir::new(&uploads.dir)),
        None => router,
    }
}

/// Wraps `router` in request tracing, a per-request timeout answering
/// 408, and permissive CORS.
pub fn with_middleware<S>(router: Router<S>, request_timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                request_timeout,
            ))
            .layer(CorsLayer::permissive()),
    )
}

fn upload_mount_point(public_base_url: &str) -> Option<&str> {
    let mount = public_base_url.trim_end_matches('/');
    (mount.starts_with('/') && mount.len() > 1).then_some(mount)
}

#[cfg(feature = "swagger-ui")]
fn docs_router() -> Router<AppState> {
    utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_router() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
