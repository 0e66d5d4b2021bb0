//! Buscador por palabras clave sobre el sitemap.
//!
//! Flujo:
//!   1. Normaliza la consulta (minúsculas, recorte) y extrae palabras clave de más de 2 caracteres.
//!   2. Si alguna solución se llama exactamente como la consulta, devuelve solo esas.
//!   3. Si no, puntúa cada solución por contención de la consulta completa en sus campos y,
//!      si ningún campo la contiene, por proporción de palabras clave encontradas.
//!   4. Añade los foros que contienen la consulta (sin puntuación) al final.

use std::cmp::Ordering;

use serde::Serialize;

use crate::heuristics::ScoringWeights;
use crate::models::{SearchHit, SearchResult, SitemapDocument, SitemapEntry};

pub const EXACT_MATCH_DETAIL: &str = "Coincidencia exacta en el nombre";

/// Consulta normalizada.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub text: String,
    pub keywords: Vec<String>,
}

impl NormalizedQuery {
    pub fn new(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        let keywords = text
            .split_whitespace()
            .filter(|k| k.chars().count() > 2)
            .map(str::to_string)
            .collect();
        Self { text, keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Resultado clasificado de una búsqueda, tal y como lo consume la interfaz.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SearchOutcome {
    /// Una única coincidencia exacta: se navega directamente a la solución.
    ExactMatch { solution_id: String, result: SearchResult },
    Results { results: Vec<SearchResult> },
    Empty,
}

pub fn search(query: &str, sitemap: &SitemapDocument, weights: &ScoringWeights) -> Vec<SearchResult> {
    let query = NormalizedQuery::new(query);
    if query.is_empty() {
        return Vec::new();
    }

    let exact: Vec<SearchResult> = sitemap
        .solutions()
        .filter(|(_, s)| s.name.to_lowercase() == query.text)
        .map(|(category, s)| SearchResult {
            hit: SearchHit::Solution { solution: s.clone() },
            category: category.to_string(),
            match_score: Some(weights.exact),
            match_details: Some(vec![EXACT_MATCH_DETAIL.to_string()]),
        })
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    let mut results: Vec<SearchResult> = sitemap
        .solutions()
        .filter_map(|(category, s)| {
            let (score, details) = score_entry(&query, s, weights);
            (score > 0.0).then(|| SearchResult {
                hit: SearchHit::Solution { solution: s.clone() },
                category: category.to_string(),
                match_score: Some(score),
                match_details: Some(details),
            })
        })
        .collect();
    sort_by_score(&mut results);

    results.extend(
        sitemap
            .forums()
            .filter(|(_, f)| {
                f.name.to_lowercase().contains(&query.text)
                    || f.description.to_lowercase().contains(&query.text)
            })
            .map(|(category, f)| SearchResult {
                hit: SearchHit::Forum { forum: f.clone() },
                category: category.to_string(),
                match_score: None,
                match_details: None,
            }),
    );

    results
}

/// Orden estable descendente; los resultados sin puntuación van detrás.
fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| match (a.match_score, b.match_score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

struct Field {
    label: &'static str,
    values: Vec<String>,
    weight: f64,
}

fn fields(entry: &SitemapEntry, weights: &ScoringWeights) -> [Field; 5] {
    let lower = |values: &[String]| values.iter().map(|v| v.to_lowercase()).collect::<Vec<_>>();
    [
        Field { label: "Nombre", values: vec![entry.name.to_lowercase()], weight: weights.name },
        Field {
            label: "Descripción",
            values: vec![entry.description.to_lowercase()],
            weight: weights.description,
        },
        Field {
            label: "Descripción completa",
            values: entry.full_description.iter().map(|d| d.to_lowercase()).collect(),
            weight: weights.full_description,
        },
        Field { label: "Características", values: lower(&entry.features), weight: weights.features },
        Field { label: "Etiquetas", values: lower(&entry.tags), weight: weights.tags },
    ]
}

/// Puntúa una solución frente a la consulta y devuelve los campos que coinciden.
pub fn score_entry(query: &NormalizedQuery, entry: &SitemapEntry, weights: &ScoringWeights) -> (f64, Vec<String>) {
    let fields = fields(entry, weights);

    let mut score = 0.0;
    let mut details = Vec::new();
    for field in &fields {
        if field.values.iter().any(|v| v.contains(&query.text)) {
            score += field.weight;
            details.push(field.label.to_string());
        }
    }
    if score > 0.0 || query.keywords.is_empty() {
        return (score, details);
    }

    let total = query.keywords.len() as f64;
    for field in &fields {
        let hits = query
            .keywords
            .iter()
            .filter(|k| field.values.iter().any(|v| v.contains(k.as_str())))
            .count();
        if hits > 0 {
            score += hits as f64 / total * field.weight;
            details.push(format!("{} ({}/{} palabras)", field.label, hits, query.keywords.len()));
        }
    }
    (score, details)
}

pub fn classify(results: Vec<SearchResult>) -> SearchOutcome {
    let single_exact = results.len() == 1
        && results[0]
            .match_details
            .as_ref()
            .is_some_and(|d| d.iter().any(|x| x == EXACT_MATCH_DETAIL));
    let mut results = results;
    match results.pop() {
        Some(result) if single_exact => {
            let solution_id = result.solution().map(|s| s.id.clone()).unwrap_or_default();
            SearchOutcome::ExactMatch { solution_id, result }
        }
        Some(last) => {
            results.push(last);
            SearchOutcome::Results { results }
        }
        None => SearchOutcome::Empty,
    }
}

/// Sugerencias de autocompletado: primero los nombres que empiezan por el
/// prefijo y después los que lo contienen.
pub fn suggest(prefix: &str, sitemap: &SitemapDocument, limit: usize) -> Vec<String> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.chars().count() < 2 || limit == 0 {
        return Vec::new();
    }

    let mut starts = Vec::new();
    let mut contains = Vec::new();
    for (_, s) in sitemap.solutions() {
        let name = s.name.to_lowercase();
        if name.starts_with(&prefix) {
            starts.push(s.name.clone());
        } else if name.contains(&prefix) {
            contains.push(s.name.clone());
        }
    }

    let mut out: Vec<String> = Vec::new();
    for name in starts.into_iter().chain(contains) {
        if !out.contains(&name) {
            out.push(name);
        }
        if out.len() == limit {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MainSection, Subsection};

    fn entry(id: &str, name: &str, description: &str) -> SitemapEntry {
        SitemapEntry {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            full_description: None,
            features: Vec::new(),
            tags: Vec::new(),
            entry_type: "official".into(),
            level: 3,
            category: "legal-research".into(),
        }
    }

    fn doc(solutions: Vec<SitemapEntry>) -> SitemapDocument {
        SitemapDocument {
            site_name: "test".into(),
            main_sections: vec![MainSection {
                id: "solutions".into(),
                name: None,
                subsections: vec![Subsection {
                    id: "legal-research".into(),
                    name: None,
                    solutions,
                    categories: Vec::new(),
                }],
            }],
        }
    }

    #[test]
    fn short_tokens_are_not_keywords() {
        let q = NormalizedQuery::new("  IA de ley  ");
        assert_eq!(q.text, "ia de ley");
        assert_eq!(q.keywords, vec!["ley".to_string()]);
        assert!(NormalizedQuery::new("ab").keywords.is_empty());
    }

    #[test]
    fn full_query_hits_sum_field_weights() {
        let mut e = entry("a", "Buscador de sentencias", "Buscador rápido");
        e.tags = vec!["buscador".into()];
        let (score, details) = score_entry(&NormalizedQuery::new("buscador"), &e, &ScoringWeights::default());
        assert_eq!(score, 10.0 + 5.0 + 6.0);
        assert_eq!(details, vec!["Nombre", "Descripción", "Etiquetas"]);
    }

    #[test]
    fn keyword_fallback_is_normalized_by_keyword_count() {
        let e = entry("a", "Gestor de expedientes", "Seguimiento de causas");
        let (score, _) = score_entry(&NormalizedQuery::new("expedientes penales"), &e, &ScoringWeights::default());
        // 1 de 2 palabras en el nombre
        assert_eq!(score, 5.0);
    }

    #[test]
    fn results_are_sorted_by_score() {
        let sitemap = doc(vec![
            entry("low", "Agenda", "Agenda de audiencias"),
            entry("high", "Audiencias virtuales", "Audiencias en línea"),
        ]);
        let results = search("audiencias", &sitemap, &ScoringWeights::default());
        let ids: Vec<_> = results.iter().filter_map(|r| r.solution()).map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn empty_query_or_sitemap_yield_nothing() {
        let sitemap = doc(vec![entry("a", "Agenda", "")]);
        assert!(search("   ", &sitemap, &ScoringWeights::default()).is_empty());
        assert!(search("agenda", &SitemapDocument::default(), &ScoringWeights::default()).is_empty());
        assert_eq!(classify(Vec::new()), SearchOutcome::Empty);
    }

    #[test]
    fn suggestions_prefer_prefix_matches() {
        let sitemap = doc(vec![
            entry("a", "Calculadora judicial", ""),
            entry("b", "JudiCalc", ""),
            entry("c", "Mi judicatura", ""),
        ]);
        assert_eq!(suggest("judi", &sitemap, 5), vec!["JudiCalc", "Calculadora judicial", "Mi judicatura"]);
        assert_eq!(suggest("judi", &sitemap, 1), vec!["JudiCalc"]);
        assert!(suggest("j", &sitemap, 5).is_empty());
    }
}
