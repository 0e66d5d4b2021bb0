#![allow(dead_code)]

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use marduk_portal::ai::{AiClient, OpenRouterClient, SharedAiService};
use marduk_portal::assist::SearchAssist;
use marduk_portal::heuristics::Heuristics;
use marduk_portal::models::SitemapDocument;
use marduk_portal::sitemap::parse_sitemap;
use marduk_portal::storage::LocalStore;

pub const SITEMAP_JSON: &str = r#"{
    "siteName": "Marduk Ecosystem",
    "mainSections": [
        {
            "id": "solutions",
            "subsections": [
                {
                    "id": "legal-research",
                    "solutions": [
                        {
                            "id": "judicalc",
                            "name": "JudiCalc",
                            "description": "Calculadora de plazos procesales",
                            "fullDescription": "Calcula plazos judiciales teniendo en cuenta días inhábiles.",
                            "features": ["Cómputo de plazos", "Calendario de días inhábiles"],
                            "tags": ["plazos", "calculadora"],
                            "type": "official",
                            "level": 5,
                            "category": "legal-research"
                        },
                        {
                            "id": "judicalc-pro",
                            "name": "JudiCalc Pro",
                            "description": "Versión avanzada de la calculadora",
                            "type": "official",
                            "level": 3,
                            "category": "legal-research"
                        }
                    ]
                },
                {
                    "id": "case-management",
                    "solutions": [
                        {
                            "id": "expedia",
                            "name": "ExpediA",
                            "description": "Gestión inteligente de expedientes",
                            "features": ["Alertas de plazos"],
                            "tags": ["expedientes"],
                            "type": "community",
                            "level": 2,
                            "category": "case-management"
                        }
                    ]
                }
            ]
        },
        {
            "id": "community",
            "subsections": [
                {
                    "id": "forums",
                    "categories": [
                        {
                            "id": "debates",
                            "name": "Debates",
                            "forums": [
                                {"id": "foro-plazos", "name": "Plazos y calendarios", "description": "Dudas sobre plazos procesales"}
                            ]
                        }
                    ]
                }
            ]
        }
    ]
}"#;

pub fn sample_sitemap() -> SitemapDocument {
    parse_sitemap(SITEMAP_JSON)
}

/// Cliente OpenRouter apuntando a `base_url` (normalmente un servidor mockito).
pub fn openrouter(base_url: &str) -> OpenRouterClient {
    OpenRouterClient::new(base_url, "http://localhost:3322", "Marduk Ecosystem", Duration::from_secs(5))
        .expect("cliente HTTP")
}

pub fn ai_client(base_url: &str, key: Option<&str>, shared: Option<Arc<dyn SharedAiService>>) -> AiClient {
    AiClient::new(openrouter(base_url), shared, key.map(str::to_string), "openai/gpt-3.5-turbo".into())
}

pub fn assist(dir: &std::path::Path, ai: AiClient, ai_search_enabled: bool) -> SearchAssist {
    let store = LocalStore::open(dir, 10).expect("almacén local");
    SearchAssist::new(
        Arc::new(RwLock::new(sample_sitemap())),
        Heuristics::default(),
        ai,
        Arc::new(Mutex::new(store)),
        ai_search_enabled,
    )
}
