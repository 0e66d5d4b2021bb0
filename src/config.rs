//! Carga y gestión de configuración del servicio (sitemap, almacenamiento y clientes IA).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_AI_MODEL: &str = "openai/gpt-3.5-turbo";

/// Proveedor del servicio IA compartido (nivel 1 del cliente IA).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub open_browser: bool,

    pub sitemap_path: PathBuf,
    pub frontend_dir: PathBuf,
    pub data_dir: PathBuf,
    pub heuristics_path: Option<PathBuf>,
    pub max_ai_solutions: usize,
    pub max_sessions: usize,

    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub ai_model: String,
    pub http_referer: String,
    pub app_title: String,
    pub ai_timeout: Duration,
    pub ai_search_enabled: bool,

    pub shared_provider: Option<LlmProvider>,
    pub shared_chat_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3322".to_string(),
            open_browser: false,
            sitemap_path: PathBuf::from("frontend/sitemap.json"),
            frontend_dir: PathBuf::from("frontend"),
            data_dir: default_data_dir(),
            heuristics_path: None,
            max_ai_solutions: 50,
            max_sessions: 500,
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
            http_referer: "http://localhost:3322".to_string(),
            app_title: "Marduk Ecosystem".to_string(),
            ai_timeout: Duration::from_secs(30),
            ai_search_enabled: false,
            shared_provider: None,
            shared_chat_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let server_addr = env::var("SERVER_ADDR").unwrap_or(defaults.server_addr);
        let open_browser = parse_bool_var("MARDUK_OPEN_BROWSER", true)?;

        let sitemap_path = env::var("MARDUK_SITEMAP_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.sitemap_path);
        let frontend_dir = env::var("MARDUK_FRONTEND_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.frontend_dir);
        let data_dir = env::var("MARDUK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let heuristics_path = env::var("MARDUK_HEURISTICS_PATH").ok().map(PathBuf::from);

        let max_ai_solutions = match env::var("MARDUK_MAX_AI_SOLUTIONS") {
            Ok(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("MARDUK_MAX_AI_SOLUTIONS inválido: {raw}"))?,
            Err(_) => defaults.max_ai_solutions,
        };
        if max_ai_solutions == 0 {
            return Err(anyhow!("MARDUK_MAX_AI_SOLUTIONS debe ser mayor que cero"));
        }

        let max_sessions = match env::var("MARDUK_MAX_SESSIONS") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("MARDUK_MAX_SESSIONS inválido: {raw}"))?,
            Err(_) => defaults.max_sessions,
        };

        let openrouter_api_key = env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let openrouter_base_url =
            env::var("OPENROUTER_BASE_URL").unwrap_or(defaults.openrouter_base_url);
        Url::parse(&openrouter_base_url)
            .with_context(|| format!("OPENROUTER_BASE_URL no es una URL válida: {openrouter_base_url}"))?;

        let ai_model = env::var("MARDUK_AI_MODEL").unwrap_or(defaults.ai_model);
        let http_referer = env::var("MARDUK_HTTP_REFERER")
            .unwrap_or_else(|_| format!("http://{server_addr}"));
        let app_title = env::var("MARDUK_APP_TITLE").unwrap_or(defaults.app_title);

        let ai_timeout = match env::var("MARDUK_AI_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("MARDUK_AI_TIMEOUT_SECS inválido: {raw}"))?,
            ),
            Err(_) => defaults.ai_timeout,
        };
        let ai_search_enabled = parse_bool_var("MARDUK_AI_SEARCH", false)?;

        let shared_provider = match env::var("LLM_PROVIDER") {
            Ok(raw) if !raw.trim().is_empty() => Some(LlmProvider::from_str(&raw)?),
            _ => None,
        };
        let shared_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or(defaults.shared_chat_model);

        Ok(Self {
            server_addr,
            open_browser,
            sitemap_path,
            frontend_dir,
            data_dir,
            heuristics_path,
            max_ai_solutions,
            max_sessions,
            openrouter_api_key,
            openrouter_base_url,
            ai_model,
            http_referer,
            app_title,
            ai_timeout,
            ai_search_enabled,
            shared_provider,
            shared_chat_model,
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marduk")
}

/// Interpreta una variable booleana ("1", "true", "si", "on"...).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "si" | "sí" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_var(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw).ok_or_else(|| anyhow!("Valor booleano inválido para {name}: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_flags() {
        assert_eq!(parse_bool("Sí"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("quizá"), None);
    }

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!(LlmProvider::from_str("OpenAI").unwrap(), LlmProvider::OpenAI);
        assert!(LlmProvider::from_str("watson").is_err());
    }

    #[test]
    fn defaults_point_to_openrouter() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.openrouter_base_url, DEFAULT_OPENROUTER_BASE_URL);
        assert!(!cfg.ai_search_enabled);
        assert_eq!(cfg.max_ai_solutions, 50);
    }
}
