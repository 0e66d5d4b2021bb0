//! Generador de soluciones por plantillas.
//!
//! Se usa cuando la búsqueda no encuentra nada y no hay respuesta válida de la IA.
//! La selección de plantillas pasa por un `TemplatePicker` inyectable para que los
//! tests puedan fijar la semilla y obtener siempre la misma salida.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::heuristics::{CategoryTable, DEFAULT_CATEGORY};
use crate::models::{GeneratedSolution, GeneratedSource, SitemapEntry};

pub const GENERATED_KEY_PREFIX: &str = "ai-solution-";
pub const COMMUNITY_TYPE: &str = "community";
/// Nivel "Idea".
pub const IDEA_LEVEL: u8 = 1;

/// Secuencia del proceso: dos soluciones generadas en el mismo milisegundo no comparten clave.
static GENERATED_SEQ: AtomicU64 = AtomicU64::new(0);

fn generated_id(now: DateTime<Utc>) -> String {
    let seq = GENERATED_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{GENERATED_KEY_PREFIX}{}-{seq}", now.timestamp_millis())
}

/// Estrategia de selección de plantillas.
pub trait TemplatePicker {
    /// Devuelve un índice en `0..len`. `len` nunca es cero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Selector basado en `StdRng`, sembrable para tests.
pub struct SeededPicker {
    rng: StdRng,
}

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }
}

impl TemplatePicker for SeededPicker {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Calcula la categoría más probable para una consulta.
///
/// Cada palabra clave suma 2 si coincide con un token de la consulta y 1 si
/// solo aparece como subcadena. Sin puntuación o con empate gana `ai-tools`.
pub fn determine_category(query: &str, table: &CategoryTable) -> String {
    let text = query.trim().to_lowercase();
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let mut best: Option<(&str, u32)> = None;
    let mut tied = false;
    for cat in table.iter() {
        let score: u32 = cat
            .keywords
            .iter()
            .map(|k| {
                let k = k.to_lowercase();
                if tokens.iter().any(|t| *t == k) {
                    2
                } else if text.contains(&k) {
                    1
                } else {
                    0
                }
            })
            .sum();
        match best {
            Some((_, s)) if score == s => tied = true,
            Some((_, s)) if score < s => {}
            _ => {
                best = Some((cat.id.as_str(), score));
                tied = false;
            }
        }
    }

    match best {
        Some((id, score)) if score > 0 && !tied => id.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

struct CategoryTemplates {
    label: &'static str,
    name_prefixes: &'static [&'static str],
    tags: &'static [&'static str],
    features: &'static [&'static str],
    use_cases: &'static [&'static str],
}

fn templates_for(category: &str) -> CategoryTemplates {
    match category {
        "case-management" => CategoryTemplates {
            label: "gestión procesal",
            name_prefixes: &["Gestor inteligente", "Asistente procesal", "Sistema de seguimiento"],
            tags: &["expedientes", "gestión-procesal", "plazos"],
            features: &[
                "Seguimiento en tiempo real del estado de cada expediente",
                "Alertas automáticas de vencimiento de plazos",
                "Tablero de carga de trabajo por despacho",
                "Historial completo de actuaciones",
                "Asignación automática de tareas al equipo",
                "Integración con la agenda de audiencias",
            ],
            use_cases: &[
                "Un juzgado que necesita priorizar {query} según su urgencia",
                "Secretarías que coordinan {query} entre varias instancias",
                "Abogados que siguen el avance de {query} desde un único panel",
            ],
        },
        "document-analysis" => CategoryTemplates {
            label: "análisis documental",
            name_prefixes: &["Analizador", "Lector inteligente", "Extractor documental"],
            tags: &["documentos", "ocr", "clasificación"],
            features: &[
                "Extracción automática de datos clave de escritos",
                "Clasificación de documentos por tipo procesal",
                "Resúmenes generados a partir de textos extensos",
                "Reconocimiento óptico de caracteres para escaneos",
                "Detección de inconsistencias entre documentos",
                "Búsqueda semántica dentro del expediente",
            ],
            use_cases: &[
                "Revisar grandes volúmenes de escritos relacionados con {query}",
                "Preparar resúmenes de {query} antes de una audiencia",
                "Clasificar automáticamente la documentación entrante sobre {query}",
            ],
        },
        "legal-research" => CategoryTemplates {
            label: "investigación jurídica",
            name_prefixes: &["Buscador jurídico", "Explorador de jurisprudencia", "Asistente de investigación"],
            tags: &["jurisprudencia", "investigación", "normativa"],
            features: &[
                "Búsqueda de precedentes relevantes por contexto",
                "Comparación de criterios entre tribunales",
                "Alertas de cambios normativos",
                "Citas verificadas con enlace a la fuente",
                "Mapas de relaciones entre sentencias",
                "Resumen de doctrina aplicable",
            ],
            use_cases: &[
                "Encontrar precedentes aplicables a {query}",
                "Analizar la evolución de criterios sobre {query}",
                "Fundamentar escritos relacionados con {query}",
            ],
        },
        "citizen-services" => CategoryTemplates {
            label: "atención ciudadana",
            name_prefixes: &["Portal ciudadano", "Asistente de atención", "Ventanilla digital"],
            tags: &["ciudadanía", "atención", "acceso-a-la-justicia"],
            features: &[
                "Orientación paso a paso en lenguaje claro",
                "Solicitud de citas en línea",
                "Consulta del estado de trámites",
                "Notificaciones por correo y mensajería",
                "Accesibilidad para personas con discapacidad",
                "Atención multicanal las 24 horas",
            ],
            use_cases: &[
                "Ciudadanos que necesitan orientación sobre {query}",
                "Oficinas de atención que reciben consultas frecuentes sobre {query}",
                "Comunidades rurales con acceso limitado a información sobre {query}",
            ],
        },
        "data-analytics" => CategoryTemplates {
            label: "analítica de datos",
            name_prefixes: &["Observatorio", "Panel analítico", "Monitor de indicadores"],
            tags: &["datos", "estadísticas", "indicadores"],
            features: &[
                "Tableros interactivos con indicadores clave",
                "Detección de tendencias y anomalías",
                "Informes periódicos automatizados",
                "Predicción de carga de trabajo",
                "Exportación de datos abiertos",
                "Comparativas entre jurisdicciones",
            ],
            use_cases: &[
                "Medir el impacto de {query} en los tiempos de resolución",
                "Detectar cuellos de botella asociados a {query}",
                "Informar decisiones de política judicial sobre {query}",
            ],
        },
        _ => CategoryTemplates {
            label: "inteligencia artificial",
            name_prefixes: &["Asistente IA", "Copiloto judicial", "Agente inteligente"],
            tags: &["ia", "automatización", "innovación"],
            features: &[
                "Respuestas en lenguaje natural",
                "Aprendizaje continuo a partir del uso",
                "Automatización de tareas repetitivas",
                "Explicaciones trazables de cada sugerencia",
                "Integración con los sistemas existentes",
                "Supervisión humana en cada decisión",
            ],
            use_cases: &[
                "Automatizar tareas rutinarias relacionadas con {query}",
                "Asistir a funcionarios que trabajan con {query}",
                "Explorar nuevas formas de abordar {query} con IA",
            ],
        },
    }
}

const DESCRIPTIONS: &[&str] = &[
    "Propuesta comunitaria de {label} para {query}.",
    "Idea de herramienta de {label} orientada a {query}.",
    "Solución en fase de idea que aplica {label} a {query}.",
];

const BENEFITS: &[&str] = &[
    "Reduce los tiempos de respuesta",
    "Disminuye la carga de trabajo manual",
    "Mejora la transparencia de los procesos",
    "Facilita el acceso a la información",
    "Reduce errores humanos",
    "Permite decisiones basadas en datos",
];

const IMPLEMENTATIONS: &[&str] = &[
    "Fase 1: levantamiento de requisitos sobre {query} con los usuarios. Fase 2: prototipo funcional. Fase 3: piloto en un despacho y evaluación.",
    "Se propone un desarrollo iterativo: prueba de concepto centrada en {query}, validación con la comunidad y despliegue gradual.",
    "Implementación modular: un núcleo de {label}, conectores con los sistemas actuales y un panel para dar seguimiento a {query}.",
];

fn fill(template: &str, query: &str, label: &str) -> String {
    template.replace("{query}", query).replace("{label}", label)
}

/// Elige `n` elementos distintos del conjunto (barajado parcial de Fisher-Yates).
fn pick_distinct(picker: &mut dyn TemplatePicker, pool: &[&str], n: usize) -> Vec<String> {
    let mut indices: Vec<usize> = (0..pool.len()).collect();
    let n = n.min(pool.len());
    for i in 0..n {
        let j = i + picker.pick(pool.len() - i);
        indices.swap(i, j);
    }
    indices[..n].iter().map(|&i| pool[i].to_string()).collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Borrador devuelto por una IA en vivo. Cualquier campo puede faltar.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AiSolutionDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub category: Option<String>,
    pub features: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub implementation: Option<String>,
    pub benefits: Option<Vec<String>>,
    pub use_cases: Option<Vec<String>>,
}

/// Generador de soluciones a partir de la consulta del usuario.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    categories: CategoryTable,
}

impl Generator {
    pub fn new(categories: CategoryTable) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn generate(&self, query: &str, picker: &mut dyn TemplatePicker) -> GeneratedSolution {
        self.generate_at(query, picker, Utc::now())
    }

    pub fn generate_at(&self, query: &str, picker: &mut dyn TemplatePicker, now: DateTime<Utc>) -> GeneratedSolution {
        let topic = query.trim().to_lowercase();
        let category = determine_category(&topic, &self.categories);
        let t = templates_for(&category);

        let prefix = t.name_prefixes[picker.pick(t.name_prefixes.len())];
        let name = format!("{prefix} para {topic}");
        let description = capitalize(&fill(DESCRIPTIONS[picker.pick(DESCRIPTIONS.len())], &topic, t.label));
        let tags = generate_tags(&topic, &category, &t, picker);
        let features = pick_distinct(picker, t.features, 4);
        let benefits = pick_distinct(picker, BENEFITS, 3);
        let use_cases = t.use_cases.iter().map(|u| fill(u, &topic, t.label)).collect();
        let full_description = format!(
            "{} surge como una idea de la comunidad para abordar {} desde la {}. Entre sus capacidades destacan: {}.",
            name,
            topic,
            t.label,
            features.iter().map(|f| f.to_lowercase()).collect::<Vec<_>>().join("; ")
        );
        let implementation = fill(IMPLEMENTATIONS[picker.pick(IMPLEMENTATIONS.len())], &topic, t.label);

        GeneratedSolution {
            entry: SitemapEntry {
                id: generated_id(now),
                name,
                description,
                full_description: Some(full_description),
                features,
                tags,
                entry_type: COMMUNITY_TYPE.to_string(),
                level: IDEA_LEVEL,
                category,
            },
            implementation,
            benefits,
            use_cases,
            query: query.to_string(),
            generated_at: now.to_rfc3339(),
            source: GeneratedSource::Template,
        }
    }

    /// Convierte el borrador de la IA en una solución completa; los huecos se
    /// rellenan con plantillas y el nivel/tipo se fuerzan a "Idea"/"community".
    pub fn from_ai_draft(
        &self,
        query: &str,
        draft: AiSolutionDraft,
        picker: &mut dyn TemplatePicker,
    ) -> GeneratedSolution {
        let mut solution = self.generate(query, picker);
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let non_empty_list = |l: Option<Vec<String>>| l.filter(|v| !v.is_empty());

        if let Some(category) = draft.category.filter(|c| self.categories.contains(c)) {
            solution.entry.category = category;
        }
        if let Some(name) = non_empty(draft.name) {
            solution.entry.name = name;
        }
        if let Some(description) = non_empty(draft.description) {
            solution.entry.description = description;
        }
        if let Some(full) = non_empty(draft.full_description) {
            solution.entry.full_description = Some(full);
        }
        if let Some(features) = non_empty_list(draft.features) {
            solution.entry.features = features;
        }
        if let Some(tags) = non_empty_list(draft.tags) {
            solution.entry.tags = tags;
        }
        if let Some(implementation) = non_empty(draft.implementation) {
            solution.implementation = implementation;
        }
        if let Some(benefits) = non_empty_list(draft.benefits) {
            solution.benefits = benefits;
        }
        if let Some(use_cases) = non_empty_list(draft.use_cases) {
            solution.use_cases = use_cases;
        }
        solution.source = GeneratedSource::Ai;
        solution
    }
}

fn generate_tags(topic: &str, category: &str, t: &CategoryTemplates, picker: &mut dyn TemplatePicker) -> Vec<String> {
    let mut tags = vec![category.to_string()];
    tags.extend(pick_distinct(picker, t.tags, 2));
    tags.extend(
        topic
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .take(3)
            .map(str::to_string),
    );
    tags.push("idea-comunitaria".to_string());

    let mut unique = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}
