use std::sync::PoisonError;

use axum::{
    extract::{Json, Path, Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    ai::{Completion, CompletionOptions, KeyStatus, ModelInfo},
    app_state::{AppState, Status},
    assist::AssistOutcome,
    models::{GeneratedSolution, SitemapEntry},
    roles::{dashboard_for, RoleDashboard, UserRole},
    search::{self, SearchOutcome},
    sitemap,
    storage::LocalStore,
    view::{View, ViewRequest},
};

pub const SESSION_HEADER: &str = "x-marduk-session";
const DEFAULT_SUGGESTIONS: usize = 5;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Sesión del cliente; si falta o es inválida se crea una nueva.
fn session_id(headers: &HeaderMap) -> Uuid {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
}

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct AssistPayload {
    query: String,
}

#[derive(Serialize)]
pub struct AssistResponse {
    session: Uuid,
    #[serde(flatten)]
    outcome: AssistOutcome,
}

#[derive(Serialize)]
pub struct SuggestionsResponse {
    solutions: Vec<String>,
    history: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    prompt: String,
    model: Option<String>,
    system_prompt: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ValidateKeyPayload {
    key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    role: UserRole,
    model: String,
    dark_mode: bool,
    has_api_key: bool,
    ai_search_enabled: bool,
    demo_mode: bool,
}

/// Cambios de ajustes; los campos ausentes no se tocan y una clave vacía la borra.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    role: Option<String>,
    model: Option<String>,
    dark_mode: Option<bool>,
    api_key: Option<String>,
    ai_search_enabled: Option<bool>,
}

#[derive(Deserialize)]
pub struct DashboardParams {
    role: Option<String>,
}

#[derive(Serialize, Clone)]
#[serde(untagged)]
pub enum SolutionDetail {
    Catalog(SitemapEntry),
    Generated(GeneratedSolution),
}

#[derive(Serialize)]
#[serde(tag = "content", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewContent {
    Home { site_name: String, recent_searches: Vec<String> },
    Solution { solution: SolutionDetail },
    NotFound { id: String },
    Search { outcome: SearchOutcome },
    Category { solutions: Vec<SitemapEntry> },
}

#[derive(Serialize)]
pub struct ViewResponse {
    session: Uuid,
    request: ViewRequest,
    #[serde(flatten)]
    content: ViewContent,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    session: Uuid,
    searches: Vec<String>,
    navigation: Vec<String>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search_handler))
        .route("/api/assist", post(assist_handler))
        .route("/api/suggestions", get(suggestions_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/models", get(models_handler))
        .route("/api/auth/validate", post(validate_key_handler))
        .route("/api/settings", get(get_settings_handler).put(put_settings_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/view", get(view_handler))
        .route("/api/solutions/generated", get(generated_list_handler))
        .route("/api/solutions/:id", get(solution_handler))
        .route("/api/history", get(history_handler))
        .route("/api/sitemap/reload", post(reload_sitemap_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers de búsqueda ---

#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchOutcome> {
    Json(state.assist.search(&params.q))
}

#[axum::debug_handler]
async fn assist_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AssistPayload>,
) -> Result<Json<AssistResponse>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "La consulta no puede estar vacía."));
    }
    let session = session_id(&headers);
    match state.assist.run(session, &payload.query).await {
        AssistOutcome::Stale => Err(api_error(
            StatusCode::CONFLICT,
            "Hay una búsqueda más reciente en curso para esta sesión.",
        )),
        outcome => Ok(Json(AssistResponse { session, outcome })),
    }
}

#[axum::debug_handler]
async fn suggestions_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SuggestionsResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    let solutions = {
        let sitemap = state.sitemap().read().unwrap_or_else(PoisonError::into_inner);
        search::suggest(&params.q, &sitemap, limit)
    };
    let needle = params.q.trim().to_lowercase();
    let history = if needle.is_empty() {
        Vec::new()
    } else {
        state
            .store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .search_history()
            .into_iter()
            .filter(|q| q.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    };
    Json(SuggestionsResponse { solutions, history })
}

// --- Handlers de IA ---

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<Completion>, ApiError> {
    if payload.prompt.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "El mensaje no puede estar vacío."));
    }
    let options = {
        let store = state.store().lock().unwrap_or_else(PoisonError::into_inner);
        CompletionOptions {
            api_key: store.api_key(),
            model: payload.model.or_else(|| store.ai_model()),
            system_prompt: payload.system_prompt,
            ..Default::default()
        }
    };
    Ok(Json(state.assist.ai.complete(&payload.prompt, &options).await))
}

#[axum::debug_handler]
async fn models_handler(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    let key = state.assist.ai.resolve_key(&stored_key_options(&state));
    state
        .assist
        .ai
        .openrouter()
        .list_models(key.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            error!("Error listando modelos de OpenRouter: {:#}", e);
            api_error(StatusCode::BAD_GATEWAY, format!("No se pudieron obtener los modelos: {e}"))
        })
}

#[axum::debug_handler]
async fn validate_key_handler(
    State(state): State<AppState>,
    payload: Option<Json<ValidateKeyPayload>>,
) -> Result<Json<KeyStatus>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let stored = state
        .store()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .api_key();
    let key = state
        .assist
        .ai
        .resolve_key(&CompletionOptions {
            api_key: payload.key.or(stored),
            ..Default::default()
        })
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No hay ninguna clave de API que validar."))?;

    state
        .assist
        .ai
        .openrouter()
        .key_status(&key)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Error validando la clave de OpenRouter: {:#}", e);
            api_error(StatusCode::BAD_GATEWAY, format!("No se pudo validar la clave: {e}"))
        })
}

// --- Handlers de ajustes y paneles ---

/// Opciones con la clave guardada por el usuario.
fn stored_key_options(state: &AppState) -> CompletionOptions {
    CompletionOptions {
        api_key: state.store().lock().unwrap_or_else(PoisonError::into_inner).api_key(),
        ..Default::default()
    }
}

fn settings_view(state: &AppState) -> SettingsView {
    let ai = &state.assist.ai;
    let options = stored_key_options(state);
    let store = state.store().lock().unwrap_or_else(PoisonError::into_inner);
    SettingsView {
        role: store.user_role(),
        model: store.ai_model().unwrap_or_else(|| ai.default_model().to_string()),
        dark_mode: store.dark_mode(),
        has_api_key: ai.resolve_key(&options).is_some(),
        ai_search_enabled: state.assist.ai_search_enabled(),
        demo_mode: ai.is_demo_mode(&options),
    }
}

#[axum::debug_handler]
async fn get_settings_handler(State(state): State<AppState>) -> Json<SettingsView> {
    Json(settings_view(&state))
}

fn apply_settings(store: &mut LocalStore, update: &SettingsUpdate) -> anyhow::Result<()> {
    if let Some(role) = &update.role {
        store.set_user_role(UserRole::parse(role))?;
    }
    if let Some(model) = update.model.as_deref().filter(|m| !m.trim().is_empty()) {
        store.set_ai_model(model.trim())?;
    }
    if let Some(dark) = update.dark_mode {
        store.set_dark_mode(dark)?;
    }
    if let Some(key) = &update.api_key {
        store.set_api_key(Some(key.as_str()))?;
    }
    Ok(())
}

#[axum::debug_handler]
async fn put_settings_handler(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SettingsView>, ApiError> {
    let result = apply_settings(
        &mut state.store().lock().unwrap_or_else(PoisonError::into_inner),
        &update,
    );
    if let Err(e) = result {
        error!("Error guardando ajustes: {:#}", e);
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("No se pudieron guardar los ajustes: {e}"),
        ));
    }
    if update.api_key.is_some() {
        state.assist.ai.reset_demo_mode();
    }
    if let Some(enabled) = update.ai_search_enabled {
        state.assist.set_ai_search_enabled(enabled);
    }
    Ok(Json(settings_view(&state)))
}

#[axum::debug_handler]
async fn dashboard_handler(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Json<RoleDashboard> {
    let role = match params.role {
        Some(r) => UserRole::parse(&r),
        None => state.store().lock().unwrap_or_else(PoisonError::into_inner).user_role(),
    };
    Json(dashboard_for(role))
}

// --- Handlers de vistas y soluciones ---

fn find_solution(state: &AppState, id: &str) -> Option<SolutionDetail> {
    let from_catalog = state
        .sitemap()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .find_solution(id)
        .cloned();
    from_catalog.map(SolutionDetail::Catalog).or_else(|| {
        state
            .store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generated(id)
            .map(SolutionDetail::Generated)
    })
}

#[axum::debug_handler]
async fn view_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Json<ViewResponse> {
    let session = session_id(&headers);
    let raw = raw.unwrap_or_default();
    let request = ViewRequest::from_query(&raw);

    state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_navigation(session, &format!("/?{raw}"));

    let content = match &request.view {
        View::Home => {
            let site_name = state
                .sitemap()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .site_name
                .clone();
            let recent_searches = state
                .store()
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .search_history();
            ViewContent::Home { site_name, recent_searches }
        }
        View::Solution { id } => match find_solution(&state, id) {
            Some(solution) => ViewContent::Solution { solution },
            None => ViewContent::NotFound { id: id.clone() },
        },
        View::Search { query } => ViewContent::Search {
            outcome: state.assist.search(query),
        },
        View::Category { id } => ViewContent::Category {
            solutions: state
                .sitemap()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .solutions_in(id)
                .into_iter()
                .cloned()
                .collect(),
        },
    };

    Json(ViewResponse { session, request, content })
}

#[axum::debug_handler]
async fn solution_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SolutionDetail>, ApiError> {
    find_solution(&state, &id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("No existe la solución '{id}'.")))
}

#[axum::debug_handler]
async fn generated_list_handler(State(state): State<AppState>) -> Json<Vec<GeneratedSolution>> {
    Json(
        state
            .store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list_generated(),
    )
}

#[axum::debug_handler]
async fn history_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<HistoryResponse> {
    let session = session_id(&headers);
    let searches = state
        .store()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .search_history();
    let navigation = state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .navigation(session);
    Json(HistoryResponse { session, searches, navigation })
}

// --- Sitemap, estado y apagado ---

#[axum::debug_handler]
async fn reload_sitemap_handler(State(state): State<AppState>) -> Json<Status> {
    let doc = sitemap::load_sitemap(&state.config.sitemap_path).await;
    if doc.is_empty() {
        warn!("El sitemap recargado está vacío.");
    }
    *state.sitemap().write().unwrap_or_else(PoisonError::into_inner) = doc;
    state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .message = "Sitemap recargado.".to_string();
    Json(current_status(&state))
}

pub fn current_status(state: &AppState) -> Status {
    let mut status = state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let sitemap = state.sitemap().read().unwrap_or_else(PoisonError::into_inner);
    status.site_name = sitemap.site_name.clone();
    status.solutions = sitemap.solutions().count();
    status.forums = sitemap.forums().count();
    status.ai_search_enabled = state.assist.ai_search_enabled();
    status.demo_mode = state.assist.ai.is_demo_mode(&stored_key_options(state));
    status
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(current_status(&state))
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    {
        let _ = sender.send(());
    }
    StatusCode::OK
}
