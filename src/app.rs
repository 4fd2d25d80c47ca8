use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::AcademicStore;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin, require_student, require_teacher};
use crate::services::{CatalogService, ProgressionService, RosterService, SystemService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AcademicStore>,
    pub progression: ProgressionService,
    pub catalog: CatalogService,
    pub roster: RosterService,
    pub system: SystemService,
}

impl AppState {
    pub fn new(store: Arc<dyn AcademicStore>, config: &AppConfig) -> Self {
        Self {
            progression: ProgressionService::new(store.clone(), config.progression.clone()),
            catalog: CatalogService::new(store.clone()),
            roster: RosterService::new(store.clone()),
            system: SystemService::new(store.clone()),
            store,
        }
    }
}

pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Role-gated API
        .merge(student_routes())
        .merge(teacher_routes())
        .merge(admin_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") || origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

fn student_routes() -> Router<AppState> {
    use protected::student;

    Router::new()
        .route("/api/students/available-subjects", get(student::available_subjects))
        .route("/api/students/eligibility/:subject_id", get(student::eligibility))
        .route("/api/students/progress", get(student::progress))
        .route("/api/students/enrollments", get(student::enrollments))
        .route("/api/students/grades", get(student::grades))
        .route_layer(middleware::from_fn(require_student))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

fn teacher_routes() -> Router<AppState> {
    use protected::teacher;

    Router::new()
        .route("/api/teachers/groups", get(teacher::groups))
        .route("/api/teachers/groups/:group_id", get(teacher::group_detail))
        .route(
            "/api/teachers/grades/:group_id/:student_id",
            get(teacher::grade_get).patch(teacher::grade_patch),
        )
        .route_layer(middleware::from_fn(require_teacher))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

fn admin_routes() -> Router<AppState> {
    use elevated::{catalog, students, system};

    Router::new()
        // System
        .route("/api/admin/system/end-quarter", post(system::end_quarter))
        .route("/api/admin/system/state", get(system::state_get).patch(system::state_patch))
        // Catalog
        .route("/api/admin/courses", post(catalog::course_post))
        .route("/api/admin/subjects", post(catalog::subject_post))
        .route("/api/admin/curriculum", post(catalog::curriculum_post))
        .route("/api/admin/subjects/:subject_id/prerequisites", post(catalog::prerequisite_post))
        .route("/api/admin/groups", post(catalog::group_post))
        .route("/api/admin/groups/:group_id/enrollments", post(catalog::enrollment_post))
        // Students
        .route("/api/admin/students", post(students::student_post))
        .route("/api/admin/students/:student_id/toggle-pay", post(students::toggle_pay))
        .route("/api/admin/students/:student_id/advance", post(students::advance))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}
