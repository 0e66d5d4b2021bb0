//! Modelos de dominio (sitemap, resultados de búsqueda y soluciones generadas).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

fn default_level() -> u8 {
    MIN_LEVEL
}

/// Acepta cualquier entero y lo lleva al rango 1..=5.
fn clamped_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(i64::from(MIN_LEVEL), i64::from(MAX_LEVEL)) as u8)
}

/// Lista tolerante: los elementos que no encajan se descartan con un aviso
/// en lugar de invalidar el documento entero.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
                warn!("Entrada del sitemap '{}' descartada: {}", id, e);
                None
            }
        })
        .collect())
}

/// Entrada del catálogo de soluciones tal y como aparece en el sitemap.
/// Inmutable una vez cargada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    /// Nivel de madurez, de 1 ("Idea") a 5.
    #[serde(default = "default_level", deserialize_with = "clamped_level")]
    pub level: u8,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub forums: Vec<ForumEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub solutions: Vec<SitemapEntry>,
    #[serde(default)]
    pub categories: Vec<ForumCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainSection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

/// Documento completo del sitemap: el "índice" de búsqueda.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapDocument {
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub main_sections: Vec<MainSection>,
}

/// Lo que se encontró: una solución o un foro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchHit {
    Solution { solution: SitemapEntry },
    Forum { forum: ForumEntry },
}

/// Resultado efímero de una consulta, construido por petición.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_details: Option<Vec<String>>,
}

impl SearchResult {
    pub fn solution(&self) -> Option<&SitemapEntry> {
        match &self.hit {
            SearchHit::Solution { solution } => Some(solution),
            SearchHit::Forum { .. } => None,
        }
    }

    pub fn forum(&self) -> Option<&ForumEntry> {
        match &self.hit {
            SearchHit::Forum { forum } => Some(forum),
            SearchHit::Solution { .. } => None,
        }
    }
}

/// Origen del contenido de una solución generada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedSource {
    Ai,
    Template,
}

/// Solución sintetizada cuando no hay coincidencias en el catálogo.
/// Se persiste bajo la clave `ai-solution-<timestamp>-<secuencia>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSolution {
    #[serde(flatten)]
    pub entry: SitemapEntry,
    pub implementation: String,
    pub benefits: Vec<String>,
    pub use_cases: Vec<String>,
    pub query: String,
    pub generated_at: String,
    pub source: GeneratedSource,
}
