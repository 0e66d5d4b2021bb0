//! Persistencia local: almacén clave/valor en disco (equivalente a `localStorage`)
//! y almacén de sesión en memoria (equivalente a `sessionStorage`).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::generator::GENERATED_KEY_PREFIX;
use crate::models::GeneratedSolution;
use crate::roles::UserRole;

pub const KEY_API_KEY: &str = "OPENROUTER_API_KEY";
pub const KEY_USER_ROLE: &str = "mardukUserRole";
pub const KEY_AI_MODEL: &str = "mardukAIModel";
pub const KEY_SEARCH_HISTORY: &str = "mardukSearchHistory";
pub const KEY_DARK_MODE: &str = "darkModeEnabled";

pub const MAX_SEARCH_HISTORY: usize = 20;
pub const MAX_NAVIGATION_HISTORY: usize = 50;
pub const DEFAULT_MAX_SESSIONS: usize = 500;

const STORE_FILE: &str = "local_storage.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, Value>,
    /// Claves `ai-solution-*`, de la menos a la más recientemente usada.
    #[serde(default)]
    ai_solution_order: Vec<String>,
}

/// Almacén persistente con política de capacidad LRU para las soluciones generadas.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    data: StoreFile,
    max_ai_solutions: usize,
}

impl LocalStore {
    /// Abre (o crea) el almacén en `dir`. Un fichero corrupto se descarta.
    pub fn open(dir: &Path, max_ai_solutions: usize) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("No se pudo crear el directorio de datos {}", dir.display()))?;
        let path = dir.join(STORE_FILE);

        let data = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Almacén local corrupto en {} ({}); se inicia vacío.", path.display(), e);
                StoreFile::default()
            }),
            Err(_) => StoreFile::default(),
        };
        info!("Almacén local abierto en {} ({} claves).", path.display(), data.entries.len());

        let mut store = Self {
            path,
            data,
            max_ai_solutions: max_ai_solutions.max(1),
        };
        store.reconcile_order();
        Ok(store)
    }

    /// Mantiene el orden LRU coherente con las claves realmente guardadas.
    fn reconcile_order(&mut self) {
        let entries = &self.data.entries;
        self.data.ai_solution_order.retain(|k| entries.contains_key(k));
        let missing: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(GENERATED_KEY_PREFIX))
            .filter(|k| !self.data.ai_solution_order.contains(*k))
            .cloned()
            .collect();
        for key in missing.into_iter().rev() {
            self.data.ai_solution_order.insert(0, key);
        }
    }

    fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.data)?;
        fs::write(&tmp, raw).with_context(|| format!("escribiendo {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("reemplazando {}", self.path.display()))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.data.entries.insert(key.to_string(), value);
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.data.entries.remove(key).is_some() {
            self.data.ai_solution_order.retain(|k| k != key);
            self.persist()?;
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.entries.keys()
    }

    // --- Ajustes de usuario ---

    pub fn api_key(&self) -> Option<String> {
        self.get_str(KEY_API_KEY)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    pub fn set_api_key(&mut self, key: Option<&str>) -> Result<()> {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => self.set(KEY_API_KEY, Value::String(k.to_string())),
            None => self.remove(KEY_API_KEY),
        }
    }

    /// Rol guardado; valores desconocidos caen al rol por defecto.
    pub fn user_role(&self) -> UserRole {
        self.get_str(KEY_USER_ROLE).map(UserRole::parse).unwrap_or_default()
    }

    pub fn set_user_role(&mut self, role: UserRole) -> Result<()> {
        self.set(KEY_USER_ROLE, Value::String(role.as_str().to_string()))
    }

    pub fn ai_model(&self) -> Option<String> {
        self.get_str(KEY_AI_MODEL).map(str::to_string)
    }

    pub fn set_ai_model(&mut self, model: &str) -> Result<()> {
        self.set(KEY_AI_MODEL, Value::String(model.to_string()))
    }

    pub fn dark_mode(&self) -> bool {
        match self.get(KEY_DARK_MODE) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<()> {
        self.set(KEY_DARK_MODE, Value::Bool(enabled))
    }

    // --- Historial de búsqueda ---

    pub fn search_history(&self) -> Vec<String> {
        self.get(KEY_SEARCH_HISTORY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Añade una consulta al principio, sin duplicados y con tope.
    pub fn push_search(&mut self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        let mut history = self.search_history();
        let lowered = query.to_lowercase();
        history.retain(|q| q.to_lowercase() != lowered);
        history.insert(0, query.to_string());
        history.truncate(MAX_SEARCH_HISTORY);
        self.set(KEY_SEARCH_HISTORY, serde_json::to_value(history)?)
    }

    // --- Soluciones generadas ---

    /// Guarda una solución y devuelve las claves desalojadas por capacidad.
    pub fn save_generated(&mut self, solution: &GeneratedSolution) -> Result<Vec<String>> {
        let key = solution.entry.id.clone();
        self.data.entries.insert(key.clone(), serde_json::to_value(solution)?);
        self.data.ai_solution_order.retain(|k| *k != key);
        self.data.ai_solution_order.push(key);

        let mut evicted = Vec::new();
        while self.data.ai_solution_order.len() > self.max_ai_solutions {
            let oldest = self.data.ai_solution_order.remove(0);
            self.data.entries.remove(&oldest);
            evicted.push(oldest);
        }
        if !evicted.is_empty() {
            debug!("Soluciones generadas desalojadas: {:?}", evicted);
        }
        self.persist()?;
        Ok(evicted)
    }

    /// Lee una solución generada y la marca como la más reciente.
    pub fn generated(&mut self, id: &str) -> Option<GeneratedSolution> {
        let value = self.data.entries.get(id)?;
        let solution: GeneratedSolution = match serde_json::from_value(value.clone()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Solución generada {} ilegible: {}", id, e);
                return None;
            }
        };
        if self.data.ai_solution_order.last().map(String::as_str) != Some(id) {
            self.data.ai_solution_order.retain(|k| k != id);
            self.data.ai_solution_order.push(id.to_string());
            if let Err(e) = self.persist() {
                warn!("No se pudo actualizar el orden LRU: {e:#}");
            }
        }
        Some(solution)
    }

    /// Soluciones generadas, de la más a la menos reciente.
    pub fn list_generated(&self) -> Vec<GeneratedSolution> {
        self.data
            .ai_solution_order
            .iter()
            .rev()
            .filter_map(|k| self.data.entries.get(k))
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect()
    }

    pub fn generated_count(&self) -> usize {
        self.data.ai_solution_order.len()
    }
}

/// Historial de navegación por sesión, solo en memoria. Conserva como mucho
/// `max_sessions` sesiones; al superarlo se olvida la usada hace más tiempo.
#[derive(Debug)]
pub struct SessionStore {
    navigation: HashMap<Uuid, Vec<String>>,
    /// De la sesión usada hace más tiempo a la más reciente.
    order: VecDeque<Uuid>,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            navigation: HashMap::new(),
            order: VecDeque::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn push_navigation(&mut self, session: Uuid, location: &str) {
        self.touch(session);
        let history = self.navigation.entry(session).or_default();
        if history.last().map(String::as_str) == Some(location) {
            return;
        }
        history.push(location.to_string());
        if history.len() > MAX_NAVIGATION_HISTORY {
            let excess = history.len() - MAX_NAVIGATION_HISTORY;
            history.drain(..excess);
        }
    }

    fn touch(&mut self, session: Uuid) {
        if self.order.back() != Some(&session) {
            self.order.retain(|s| *s != session);
            self.order.push_back(session);
        }
        while self.order.len() > self.max_sessions {
            if let Some(oldest) = self.order.pop_front() {
                self.navigation.remove(&oldest);
                debug!("Sesión {} olvidada por capacidad.", oldest);
            }
        }
    }

    pub fn navigation(&self, session: Uuid) -> Vec<String> {
        self.navigation.get(&session).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self, session: Uuid) {
        self.navigation.remove(&session);
        self.order.retain(|s| *s != session);
    }

    pub fn session_count(&self) -> usize {
        self.navigation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{Generator, SeededPicker};
    use chrono::{Duration, Utc};

    fn solution_at(offset_ms: i64) -> GeneratedSolution {
        let now = Utc::now() + Duration::milliseconds(offset_ms);
        Generator::default().generate_at("consulta de prueba", &mut SeededPicker::new(3), now)
    }

    #[test]
    fn settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = LocalStore::open(dir.path(), 5).unwrap();
            store.set_api_key(Some("  sk-or-test ")).unwrap();
            store.set_user_role(UserRole::Investigador).unwrap();
            store.set_dark_mode(true).unwrap();
        }
        let store = LocalStore::open(dir.path(), 5).unwrap();
        assert_eq!(store.api_key().as_deref(), Some("sk-or-test"));
        assert_eq!(store.user_role(), UserRole::Investigador);
        assert!(store.dark_mode());
    }

    #[test]
    fn unknown_role_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path(), 5).unwrap();
        store.set(KEY_USER_ROLE, Value::String("superusuario".into())).unwrap();
        assert_eq!(store.user_role(), UserRole::default());
    }

    #[test]
    fn search_history_is_deduplicated_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path(), 5).unwrap();
        for i in 0..30 {
            store.push_search(&format!("consulta {i}")).unwrap();
        }
        store.push_search("consulta 10").unwrap();
        let history = store.search_history();
        assert_eq!(history.len(), MAX_SEARCH_HISTORY);
        assert_eq!(history[0], "consulta 10");
        assert_eq!(history.iter().filter(|q| *q == "consulta 10").count(), 1);
    }

    #[test]
    fn generated_solutions_evict_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path(), 2).unwrap();
        let a = solution_at(0);
        let b = solution_at(1);
        let c = solution_at(2);
        store.save_generated(&a).unwrap();
        store.save_generated(&b).unwrap();
        // leer "a" la convierte en la más reciente
        assert!(store.generated(&a.entry.id).is_some());
        let evicted = store.save_generated(&c).unwrap();
        assert_eq!(evicted, vec![b.entry.id.clone()]);
        assert_eq!(store.generated_count(), 2);
        let ids: Vec<_> = store.list_generated().into_iter().map(|s| s.entry.id).collect();
        assert_eq!(ids, vec![c.entry.id.clone(), a.entry.id.clone()]);
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORE_FILE), "{roto").unwrap();
        let store = LocalStore::open(dir.path(), 5).unwrap();
        assert_eq!(store.keys().count(), 0);
    }

    #[test]
    fn navigation_history_is_per_session() {
        let mut sessions = SessionStore::default();
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        sessions.push_navigation(s1, "/?app=judicalc");
        sessions.push_navigation(s1, "/?app=judicalc");
        sessions.push_navigation(s1, "/?search=plazos");
        assert_eq!(sessions.navigation(s1).len(), 2);
        assert!(sessions.navigation(s2).is_empty());
        for i in 0..60 {
            sessions.push_navigation(s2, &format!("/?tab={i}"));
        }
        assert_eq!(sessions.navigation(s2).len(), MAX_NAVIGATION_HISTORY);
        assert_eq!(sessions.navigation(s2)[0], "/?tab=10");
    }

    #[test]
    fn oldest_sessions_are_forgotten_beyond_capacity() {
        let mut sessions = SessionStore::with_capacity(2);
        let (s1, s2, s3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        sessions.push_navigation(s1, "/?app=judicalc");
        sessions.push_navigation(s2, "/?app=expedia");
        // s1 vuelve a usarse: la más antigua pasa a ser s2
        sessions.push_navigation(s1, "/?search=plazos");
        sessions.push_navigation(s3, "/?category=legal-research");

        assert_eq!(sessions.session_count(), 2);
        assert!(sessions.navigation(s2).is_empty());
        assert_eq!(sessions.navigation(s1).len(), 2);
        assert_eq!(sessions.navigation(s3).len(), 1);

        for _ in 0..100 {
            sessions.push_navigation(Uuid::new_v4(), "/?");
        }
        assert_eq!(sessions.session_count(), 2);
    }

    #[test]
    fn search_history_dedup_ignores_accented_case() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path(), 5).unwrap();
        store.push_search("gestión").unwrap();
        store.push_search("Análisis").unwrap();
        store.push_search("GESTIÓN").unwrap();
        assert_eq!(store.search_history(), vec!["GESTIÓN".to_string(), "Análisis".to_string()]);
    }
}
