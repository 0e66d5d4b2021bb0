use std::sync::{Arc, Mutex, RwLock};

use axum::Router;
use marduk_portal::{
    ai::{AiClient, SharedAiService},
    api,
    app_state::{AppState, Status},
    assist::SearchAssist,
    config::AppConfig,
    heuristics::Heuristics,
    llm::LlmManager,
    sitemap,
    storage::{LocalStore, SessionStore},
};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración y heurísticas
    let cfg = AppConfig::from_env().expect("Error al cargar la configuración");
    let heuristics = Heuristics::load(cfg.heuristics_path.as_deref());

    // 3. Cargar el sitemap (vacío si falta o está malformado)
    let sitemap_doc = sitemap::load_sitemap(&cfg.sitemap_path).await;

    // 4. Abrir el almacén local
    let store = LocalStore::open(&cfg.data_dir, cfg.max_ai_solutions)
        .expect("Error abriendo el almacén local");

    // 5. Inicializar el cliente IA (servicio compartido opcional + OpenRouter + demo)
    let shared = LlmManager::from_config(&cfg).map(|m| Arc::new(m) as Arc<dyn SharedAiService>);
    let ai = AiClient::from_config(&cfg, shared).expect("Error inicializando el cliente IA");

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 6. Crear estado compartido de la aplicación
    let assist = SearchAssist::new(
        Arc::new(RwLock::new(sitemap_doc)),
        heuristics,
        ai,
        Arc::new(Mutex::new(store)),
        cfg.ai_search_enabled,
    );
    let app_state = AppState {
        config: cfg.clone(),
        assist,
        sessions: Arc::new(Mutex::new(SessionStore::with_capacity(cfg.max_sessions))),
        status: Arc::new(Mutex::new(Status {
            message: "Servidor listo.".to_string(),
            ..Default::default()
        })),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 7. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new(&cfg.frontend_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 8. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if cfg.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error en el servidor");

    info!("✅ Servidor cerrado correctamente.");
}
