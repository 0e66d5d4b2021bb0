//! Flujo completo de búsqueda asistida:
//!   entrada → buscador → [coincidencia: mostrar] o
//!   [sin resultados: IA → generador por plantillas → persistir → mostrar].
//!
//! Cada petición recibe un token por sesión; si al volver de la IA ya hay otra
//! petición más reciente en esa sesión, la respuesta se descarta.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai::{AiClient, CompletionOptions, CompletionSource};
use crate::generator::{AiSolutionDraft, Generator, SeededPicker};
use crate::heuristics::Heuristics;
use crate::models::{GeneratedSolution, SearchResult, SitemapDocument};
use crate::search::{self, SearchOutcome};
use crate::storage::LocalStore;

const SOLUTION_SYSTEM_PROMPT: &str = r#"
Eres un analista de innovación judicial. A partir de la necesidad del usuario,
propón una solución tecnológica nueva para el ecosistema judicial.

La salida DEBE ser un único objeto JSON válido con las claves:
"name", "description", "fullDescription", "category", "features" (lista),
"tags" (lista), "implementation", "benefits" (lista) y "useCases" (lista).
"category" debe ser una de: case-management, document-analysis, legal-research,
citizen-services, data-analytics, ai-tools.
Responde en español. No incluyas explicaciones, solo el JSON.
"#;

/// Token de una petición dentro de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub session: Uuid,
    pub generation: u64,
}

/// Guarda contra respuestas obsoletas: solo la última petición de cada sesión es válida.
#[derive(Debug, Default)]
pub struct RequestGuard {
    counter: AtomicU64,
    latest: Mutex<HashMap<Uuid, u64>>,
}

impl RequestGuard {
    pub fn issue(&self, session: Uuid) -> RequestToken {
        let generation = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, generation);
        RequestToken { session, generation }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&token.session)
            == Some(&token.generation)
    }

    /// Libera la sesión al terminar su última petición; un token obsoleto no toca nada.
    pub fn finish(&self, token: &RequestToken) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.get(&token.session) == Some(&token.generation) {
            latest.remove(&token.session);
        }
    }

    /// Sesiones con una petición en curso.
    pub fn active_sessions(&self) -> usize {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Libera el token al terminar, también si la petición se cancela a medias.
struct ActiveRequest<'a> {
    guard: &'a RequestGuard,
    token: RequestToken,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.guard.finish(&self.token);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AssistOutcome {
    /// Coincidencia exacta única: navegación directa.
    Navigate { solution_id: String, result: SearchResult },
    Results { results: Vec<SearchResult> },
    /// Panel de "sin resultados" (búsqueda IA desactivada).
    NoResults { query: String },
    Generated { solution: GeneratedSolution, source: CompletionSource },
    /// Otra petición más reciente de la misma sesión ya está en curso.
    Stale,
}

/// Contexto explícito del flujo de búsqueda asistida.
#[derive(Clone)]
pub struct SearchAssist {
    pub sitemap: Arc<RwLock<SitemapDocument>>,
    pub heuristics: Arc<Heuristics>,
    pub generator: Generator,
    pub ai: AiClient,
    pub store: Arc<Mutex<LocalStore>>,
    pub guard: Arc<RequestGuard>,
    pub ai_search_enabled: Arc<AtomicBool>,
}

impl SearchAssist {
    pub fn new(
        sitemap: Arc<RwLock<SitemapDocument>>,
        heuristics: Heuristics,
        ai: AiClient,
        store: Arc<Mutex<LocalStore>>,
        ai_search_enabled: bool,
    ) -> Self {
        let generator = Generator::new(heuristics.categories.clone());
        Self {
            sitemap,
            heuristics: Arc::new(heuristics),
            generator,
            ai,
            store,
            guard: Arc::new(RequestGuard::default()),
            ai_search_enabled: Arc::new(AtomicBool::new(ai_search_enabled)),
        }
    }

    pub fn ai_search_enabled(&self) -> bool {
        self.ai_search_enabled.load(Ordering::Relaxed)
    }

    pub fn set_ai_search_enabled(&self, enabled: bool) {
        self.ai_search_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Solo el buscador, sin IA ni historial.
    pub fn search(&self, query: &str) -> SearchOutcome {
        let sitemap = self.sitemap.read().unwrap_or_else(PoisonError::into_inner);
        search::classify(search::search(query, &sitemap, &self.heuristics.weights))
    }

    pub async fn run(&self, session: Uuid, query: &str) -> AssistOutcome {
        let active = ActiveRequest {
            guard: &self.guard,
            token: self.guard.issue(session),
        };
        self.run_with_token(&active.token, query).await
    }

    async fn run_with_token(&self, token: &RequestToken, query: &str) -> AssistOutcome {
        if let Err(e) = self.lock_store().push_search(query) {
            warn!("No se pudo guardar el historial de búsqueda: {e:#}");
        }

        match self.search(query) {
            SearchOutcome::ExactMatch { solution_id, result } => {
                debug!("Coincidencia exacta para '{}': {}", query, solution_id);
                return AssistOutcome::Navigate { solution_id, result };
            }
            SearchOutcome::Results { results } => return AssistOutcome::Results { results },
            SearchOutcome::Empty => {}
        }

        if !self.ai_search_enabled() || query.trim().is_empty() {
            return AssistOutcome::NoResults { query: query.trim().to_string() };
        }

        let options = {
            let store = self.lock_store();
            CompletionOptions {
                api_key: store.api_key(),
                model: store.ai_model(),
                system_prompt: Some(SOLUTION_SYSTEM_PROMPT.to_string()),
                ..Default::default()
            }
        };
        let completion = self.ai.complete(query.trim(), &options).await;

        if !self.guard.is_current(token) {
            info!("Respuesta obsoleta descartada para la sesión {}", token.session);
            return AssistOutcome::Stale;
        }

        let mut picker = SeededPicker::from_entropy();
        let draft = completion
            .is_live()
            .then(|| parse_draft(&completion.text))
            .flatten();
        let solution = match draft {
            Some(draft) => self.generator.from_ai_draft(query, draft, &mut picker),
            None => self.generator.generate(query, &mut picker),
        };

        if let Err(e) = self.lock_store().save_generated(&solution) {
            warn!("No se pudo persistir la solución generada {}: {e:#}", solution.entry.id);
        }
        info!("Solución generada '{}' ({:?})", solution.entry.name, solution.source);
        AssistOutcome::Generated { solution, source: completion.source }
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, LocalStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extrae el JSON de la respuesta de la IA (puede venir envuelto en ```json).
pub fn parse_draft(response: &str) -> Option<AiSolutionDraft> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<AiSolutionDraft>(&cleaned[start..=end]) {
        Ok(draft) => Some(draft),
        Err(e) => {
            warn!("No se pudo parsear la solución de la IA: {}. Respuesta: '{}'", e, response);
            None
        }
    }
}
