mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marduk_portal::ai::{CompletionOptions, CompletionSource, SharedAiService};
use marduk_portal::assist::AssistOutcome;
use marduk_portal::generator::{COMMUNITY_TYPE, IDEA_LEVEL};
use marduk_portal::models::GeneratedSource;
use tempfile::tempdir;
use uuid::Uuid;

/// Servicio compartido de pruebas: responde siempre lo mismo y tarda más
/// cuando el prompt contiene "lento".
struct ScriptedShared {
    answer: &'static str,
}

#[async_trait]
impl SharedAiService for ScriptedShared {
    fn name(&self) -> &str {
        "guion"
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> anyhow::Result<String> {
        assert!(options.system_prompt.as_deref().is_some_and(|p| p.contains("JSON")));
        if prompt.contains("lento") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(self.answer.to_string())
    }
}

fn shared(answer: &'static str) -> Option<Arc<dyn SharedAiService>> {
    Some(Arc::new(ScriptedShared { answer }) as Arc<dyn SharedAiService>)
}

const DRAFT: &str = r#"Aquí tienes la propuesta:
```json
{
    "name": "Lector de Autos",
    "description": "Resume autos judiciales automáticamente",
    "category": "document-analysis",
    "features": ["Resumen automático", "Extracción de partes"],
    "tags": ["autos", "resumen"],
    "implementation": "Modelo de lenguaje sobre el repositorio documental.",
    "benefits": ["Ahorro de tiempo"],
    "useCases": ["Revisión de autos en juzgados de guardia"]
}
```"#;

#[tokio::test]
async fn live_ai_draft_becomes_an_idea_level_solution() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, shared(DRAFT));
    let assist = common::assist(dir.path(), ai, true);

    let outcome = assist.run(Uuid::new_v4(), "resumir autos de guardia").await;
    let AssistOutcome::Generated { solution, source } = outcome else {
        panic!("se esperaba una solución generada: {outcome:?}");
    };
    assert_eq!(source, CompletionSource::Shared);
    assert_eq!(solution.source, GeneratedSource::Ai);
    assert_eq!(solution.entry.name, "Lector de Autos");
    assert_eq!(solution.entry.category, "document-analysis");
    assert_eq!(solution.entry.level, IDEA_LEVEL);
    assert_eq!(solution.entry.entry_type, COMMUNITY_TYPE);
    assert_eq!(solution.use_cases, vec!["Revisión de autos en juzgados de guardia".to_string()]);
    assert_eq!(solution.query, "resumir autos de guardia");

    let stored = assist.store.lock().unwrap().list_generated();
    assert_eq!(stored, vec![solution]);
}

#[tokio::test]
async fn unparseable_live_answer_falls_back_to_templates() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, shared("No sé qué proponer."));
    let assist = common::assist(dir.path(), ai, true);

    let outcome = assist.run(Uuid::new_v4(), "agenda audiencias juzgado").await;
    let AssistOutcome::Generated { solution, source } = outcome else {
        panic!("se esperaba una solución generada: {outcome:?}");
    };
    assert_eq!(source, CompletionSource::Shared);
    assert_eq!(solution.source, GeneratedSource::Template);
    assert_eq!(solution.entry.category, "case-management");
    assert!(solution.entry.id.starts_with("ai-solution-"));
}

#[tokio::test]
async fn superseded_request_is_discarded() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, shared(DRAFT));
    let assist = common::assist(dir.path(), ai, true);
    let session = Uuid::new_v4();

    let (first, second) = tokio::join!(
        assist.run(session, "asistente lento"),
        assist.run(session, "asistente veloz"),
    );

    assert_eq!(first, AssistOutcome::Stale);
    assert!(matches!(second, AssistOutcome::Generated { .. }));
    assert_eq!(assist.store.lock().unwrap().generated_count(), 1);
    assert_eq!(assist.guard.active_sessions(), 0);
}

#[tokio::test]
async fn cancelled_request_releases_its_session() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, shared(DRAFT));
    let assist = common::assist(dir.path(), ai, true);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        assist.run(Uuid::new_v4(), "asistente lento"),
    )
    .await;

    assert!(cancelled.is_err());
    assert_eq!(assist.guard.active_sessions(), 0);
}

#[tokio::test]
async fn sessions_do_not_invalidate_each_other() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, shared(DRAFT));
    let assist = common::assist(dir.path(), ai, true);

    let (first, second) = tokio::join!(
        assist.run(Uuid::new_v4(), "asistente lento"),
        assist.run(Uuid::new_v4(), "asistente veloz"),
    );

    assert!(matches!(first, AssistOutcome::Generated { .. }));
    assert!(matches!(second, AssistOutcome::Generated { .. }));
    assert_eq!(assist.store.lock().unwrap().generated_count(), 2);
    assert_eq!(assist.guard.active_sessions(), 0);
}

#[tokio::test]
async fn simultaneous_generations_keep_distinct_keys() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, shared("sin propuesta"));
    let assist = common::assist(dir.path(), ai, true);

    let (first, second) = tokio::join!(
        assist.run(Uuid::new_v4(), "asistente uno"),
        assist.run(Uuid::new_v4(), "asistente dos"),
    );
    let (AssistOutcome::Generated { solution: a, .. }, AssistOutcome::Generated { solution: b, .. }) = (first, second)
    else {
        panic!("se esperaban dos soluciones generadas");
    };

    assert_ne!(a.entry.id, b.entry.id);
    let mut store = assist.store.lock().unwrap();
    assert_eq!(store.generated_count(), 2);
    assert_eq!(store.generated(&a.entry.id), Some(a));
    assert_eq!(store.generated(&b.entry.id), Some(b));
}

#[tokio::test]
async fn history_keeps_latest_queries_first() {
    let dir = tempdir().unwrap();
    let ai = common::ai_client("http://127.0.0.1:9", None, None);
    let assist = common::assist(dir.path(), ai, false);
    let session = Uuid::new_v4();

    for query in ["plazos", "expedientes", "Plazos"] {
        assist.run(session, query).await;
    }
    let history = assist.store.lock().unwrap().search_history();
    assert_eq!(history, vec!["Plazos".to_string(), "expedientes".to_string()]);
}
