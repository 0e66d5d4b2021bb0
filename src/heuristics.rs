//! Pesos de puntuación y tablas de palabras clave por categoría.
//!
//! Son heurísticas ajustadas a mano y se tratan como datos de configuración,
//! sobrescribibles desde un JSON (`MARDUK_HEURISTICS_PATH`).

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CATEGORY: &str = "ai-tools";

/// Peso de cada campo en la puntuación de coincidencias parciales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringWeights {
    pub exact: f64,
    pub name: f64,
    pub full_description: f64,
    pub features: f64,
    pub tags: f64,
    pub description: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact: 100.0,
            name: 10.0,
            full_description: 8.0,
            features: 7.0,
            tags: 6.0,
            description: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub id: String,
    pub keywords: Vec<String>,
}

/// Categorías en orden de declaración; el orden solo importa para la salida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable(pub Vec<CategoryKeywords>);

impl CategoryTable {
    pub fn iter(&self) -> impl Iterator<Item = &CategoryKeywords> {
        self.0.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|c| c.id == id)
    }
}

fn category(id: &str, keywords: &[&str]) -> CategoryKeywords {
    CategoryKeywords {
        id: id.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self(vec![
            category(
                "case-management",
                &[
                    "expediente", "caso", "gestión", "gestion", "trámite", "tramite",
                    "seguimiento", "causa", "audiencia", "agenda", "plazo",
                ],
            ),
            category(
                "document-analysis",
                &[
                    "documento", "análisis", "analisis", "pdf", "texto", "extracción",
                    "clasificación", "ocr", "escrito", "resumen",
                ],
            ),
            category(
                "legal-research",
                &[
                    "jurisprudencia", "ley", "norma", "sentencia", "doctrina",
                    "investigación", "precedente", "código", "legislación",
                ],
            ),
            category(
                "citizen-services",
                &[
                    "ciudadano", "atención", "consulta", "cita", "orientación",
                    "acceso", "usuario", "notificación", "portal",
                ],
            ),
            category(
                "data-analytics",
                &[
                    "datos", "estadística", "estadistica", "métrica", "indicador",
                    "dashboard", "reporte", "predicción", "tendencia",
                ],
            ),
            category(
                "ai-tools",
                &[
                    "ia", "inteligencia", "artificial", "asistente", "chatbot", "modelo",
                    "automatización", "automatizacion", "aprendizaje",
                ],
            ),
        ])
    }
}

/// Conjunto completo de heurísticas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Heuristics {
    pub weights: ScoringWeights,
    pub categories: CategoryTable,
}

impl Heuristics {
    /// Carga las heurísticas desde un JSON opcional; ante cualquier problema
    /// se usan los valores por defecto.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::read(path) {
            Ok(h) => {
                info!("Heurísticas cargadas desde {}", path.display());
                h
            }
            Err(e) => {
                warn!("No se pudieron cargar las heurísticas ({e:#}); se usan los valores por defecto.");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("leyendo {}", path.display()))?;
        let mut parsed: Self = serde_json::from_str(&raw).context("JSON de heurísticas inválido")?;
        if parsed.categories.0.is_empty() {
            parsed.categories = CategoryTable::default();
        }
        Ok(parsed)
    }
}
