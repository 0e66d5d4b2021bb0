//! Carga del sitemap estático y accesos al índice en memoria.

use std::path::Path;

use tracing::{info, warn};

use crate::models::{ForumEntry, SitemapDocument, SitemapEntry};

/// Lee el sitemap desde disco. Un fichero ausente o malformado produce un
/// documento vacío (búsquedas sin resultados), nunca un error.
pub async fn load_sitemap(path: &Path) -> SitemapDocument {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => {
            let doc = parse_sitemap(&raw);
            info!(
                "Sitemap '{}' cargado: {} soluciones, {} foros.",
                doc.site_name,
                doc.solutions().count(),
                doc.forums().count()
            );
            doc
        }
        Err(e) => {
            warn!("No se pudo leer el sitemap {}: {}", path.display(), e);
            SitemapDocument::default()
        }
    }
}

pub fn parse_sitemap(raw: &str) -> SitemapDocument {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Sitemap malformado, se usa un índice vacío: {}", e);
        SitemapDocument::default()
    })
}

impl SitemapDocument {
    /// Todas las soluciones junto al id de la subsección que las contiene.
    pub fn solutions(&self) -> impl Iterator<Item = (&str, &SitemapEntry)> {
        self.main_sections
            .iter()
            .flat_map(|section| section.subsections.iter())
            .flat_map(|sub| sub.solutions.iter().map(move |s| (sub.id.as_str(), s)))
    }

    /// Todos los foros junto al id de su categoría.
    pub fn forums(&self) -> impl Iterator<Item = (&str, &ForumEntry)> {
        self.main_sections
            .iter()
            .flat_map(|section| section.subsections.iter())
            .flat_map(|sub| sub.categories.iter())
            .flat_map(|cat| cat.forums.iter().map(move |f| (cat.id.as_str(), f)))
    }

    pub fn find_solution(&self, id: &str) -> Option<&SitemapEntry> {
        self.solutions().map(|(_, s)| s).find(|s| s.id == id)
    }

    /// Soluciones de una subsección, o de una categoría declarada en las propias entradas.
    pub fn solutions_in(&self, category: &str) -> Vec<&SitemapEntry> {
        self.solutions()
            .filter(|(sub, s)| *sub == category || s.category == category)
            .map(|(_, s)| s)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions().next().is_none() && self.forums().next().is_none()
    }
}
