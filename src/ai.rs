//! Cliente de completado IA con degradación en tres niveles:
//!   1. Servicio compartido configurado.
//!   2. Llamada directa a OpenRouter con la clave del usuario, salvo que esa
//!      clave ya haya sido rechazada (modo demo para esa clave).
//!   3. Respuesta de demostración a partir de una tabla fija de frases.
//!
//! Una sola petición por llamada, sin reintentos. Nunca devuelve error al llamante.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// Servicio IA compartido (nivel 1).
#[async_trait]
pub trait SharedAiService: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    /// Clave aportada por el usuario; tiene prioridad sobre la de configuración.
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionSource {
    Shared,
    OpenRouter,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub text: String,
    pub source: CompletionSource,
}

impl Completion {
    pub fn is_live(&self) -> bool {
        self.source != CompletionSource::Demo
    }
}

#[derive(Debug, Error)]
pub enum OpenRouterError {
    #[error("clave de API inválida o caducada")]
    Unauthorized,
    #[error("error de red: {0}")]
    Network(#[source] reqwest::Error),
    #[error("respuesta HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("respuesta no válida: {0}")]
    Decode(String),
    #[error("respuesta sin contenido")]
    Empty,
}

// --- Tipos del API de OpenRouter ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "context_length")]
    pub context_length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDetails {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub usage: Option<f64>,
    #[serde(default)]
    pub limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    data: KeyDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum KeyStatus {
    Valid { details: KeyDetails },
    Invalid,
}

/// Cliente HTTP mínimo para OpenRouter.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    base_url: String,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    pub fn new(base_url: &str, referer: &str, title: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("No se pudo crear el cliente HTTP: {}", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            referer: referer.to_string(),
            title: title.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
    }

    pub async fn chat(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, OpenRouterError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });
        let body = ChatRequest {
            model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(
            "Petición a OpenRouter: {} (modelo: {})",
            prompt.chars().take(50).collect::<String>(),
            model
        );
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await
            .map_err(OpenRouterError::Network)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(OpenRouterError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpenRouterError::Http { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OpenRouterError::Decode(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OpenRouterError::Empty)
    }

    /// Lista los modelos disponibles (`GET /models`).
    pub async fn list_models(&self, api_key: Option<&str>) -> Result<Vec<ModelInfo>> {
        let mut request = self.get("/models");
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("OpenRouter respondió {} al listar modelos", response.status()));
        }
        let parsed: ModelsResponse = response.json().await?;
        Ok(parsed.data)
    }

    /// Valida una clave (`GET /auth/key`).
    pub async fn key_status(&self, api_key: &str) -> Result<KeyStatus> {
        let response = self.get("/auth/key").bearer_auth(api_key).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(KeyStatus::Invalid),
            s if s.is_success() => {
                let parsed: KeyResponse = response.json().await?;
                Ok(KeyStatus::Valid { details: parsed.data })
            }
            s => Err(anyhow!("OpenRouter respondió {} al validar la clave", s)),
        }
    }
}

/// Tabla de respuestas de demostración: la primera palabra clave presente gana.
const DEMO_PHRASES: &[(&[&str], &str)] = &[
    (
        &["hola", "buenos días", "buenas"],
        "¡Hola! Soy el asistente del ecosistema Marduk en modo demostración. Puedo orientarle sobre las soluciones del catálogo.",
    ),
    (
        &["expediente", "caso", "trámite", "tramite"],
        "Modo demostración: para la gestión de expedientes le recomendamos las soluciones de gestión procesal del catálogo, que permiten seguir plazos y actuaciones.",
    ),
    (
        &["jurisprudencia", "sentencia", "ley", "norma"],
        "Modo demostración: las herramientas de investigación jurídica del ecosistema le ayudan a localizar precedentes y normativa aplicable.",
    ),
    (
        &["documento", "pdf", "escrito", "texto"],
        "Modo demostración: las soluciones de análisis documental extraen datos clave y resumen escritos de forma automática.",
    ),
    (
        &["ciudadano", "cita", "consulta", "ayuda"],
        "Modo demostración: el portal ciudadano ofrece orientación paso a paso, citas en línea y seguimiento de trámites.",
    ),
    (
        &["datos", "estadística", "indicador"],
        "Modo demostración: el observatorio de datos ofrece tableros con indicadores de la actividad judicial.",
    ),
];

pub const DEMO_APOLOGY: &str = "Lo siento, el asistente IA no está disponible en este momento. Configure una clave de OpenRouter para obtener respuestas reales.";

/// Respuesta determinista del modo demostración.
pub fn demo_response(prompt: &str) -> String {
    let prompt = prompt.to_lowercase();
    DEMO_PHRASES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| prompt.contains(k)))
        .map(|(_, answer)| answer.to_string())
        .unwrap_or_else(|| DEMO_APOLOGY.to_string())
}

/// Claves rechazadas que se recuerdan a la vez.
const MAX_REJECTED_KEYS: usize = 32;

/// Cliente IA con degradación en cascada.
#[derive(Clone)]
pub struct AiClient {
    shared: Option<Arc<dyn SharedAiService>>,
    openrouter: OpenRouterClient,
    default_key: Option<String>,
    default_model: String,
    /// Claves que OpenRouter ha rechazado con 401, de la más antigua a la más reciente.
    rejected_keys: Arc<Mutex<VecDeque<String>>>,
}

impl AiClient {
    pub fn new(
        openrouter: OpenRouterClient,
        shared: Option<Arc<dyn SharedAiService>>,
        default_key: Option<String>,
        default_model: String,
    ) -> Self {
        Self {
            shared,
            openrouter,
            default_key,
            default_model,
            rejected_keys: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn from_config(cfg: &AppConfig, shared: Option<Arc<dyn SharedAiService>>) -> Result<Self> {
        let openrouter = OpenRouterClient::new(
            &cfg.openrouter_base_url,
            &cfg.http_referer,
            &cfg.app_title,
            cfg.ai_timeout,
        )?;
        Ok(Self::new(
            openrouter,
            shared,
            cfg.openrouter_api_key.clone(),
            cfg.ai_model.clone(),
        ))
    }

    pub fn openrouter(&self) -> &OpenRouterClient {
        &self.openrouter
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn has_shared_service(&self) -> bool {
        self.shared.is_some()
    }

    /// Modo demo para las opciones dadas: la clave efectiva fue rechazada antes.
    pub fn is_demo_mode(&self, options: &CompletionOptions) -> bool {
        self.resolve_key(options).is_some_and(|key| self.is_rejected(&key))
    }

    fn is_rejected(&self, key: &str) -> bool {
        self.rejected_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|k| k == key)
    }

    fn reject(&self, key: &str) {
        let mut rejected = self.rejected_keys.lock().unwrap_or_else(PoisonError::into_inner);
        if rejected.iter().any(|k| k == key) {
            return;
        }
        rejected.push_back(key.to_string());
        while rejected.len() > MAX_REJECTED_KEYS {
            rejected.pop_front();
        }
    }

    /// Olvida las claves rechazadas, p. ej. tras guardar una clave nueva.
    pub fn reset_demo_mode(&self) {
        self.rejected_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Clave efectiva: la del usuario o, en su defecto, la de configuración.
    pub fn resolve_key(&self, options: &CompletionOptions) -> Option<String> {
        options
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.default_key.clone())
    }

    pub async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Completion {
        if let Some(shared) = &self.shared {
            match shared.complete(prompt, options).await {
                Ok(text) => {
                    return Completion { text, source: CompletionSource::Shared };
                }
                Err(e) => warn!("Servicio IA compartido '{}' falló: {:#}", shared.name(), e),
            }
        }

        if let Some(key) = self.resolve_key(options).filter(|k| !self.is_rejected(k)) {
            let model = options
                .model
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(self.default_model.as_str());
            match self.openrouter.chat(&key, model, prompt, options).await {
                Ok(text) => {
                    info!("Respuesta de OpenRouter recibida ({} caracteres).", text.len());
                    return Completion { text, source: CompletionSource::OpenRouter };
                }
                Err(OpenRouterError::Unauthorized) => {
                    warn!("Clave de OpenRouter rechazada (401); modo demostración para esa clave.");
                    self.reject(&key);
                }
                Err(e) => warn!("Fallo en OpenRouter, se usa la respuesta de demostración: {}", e),
            }
        }

        self.demo(prompt)
    }

    fn demo(&self, prompt: &str) -> Completion {
        Completion {
            text: demo_response(prompt),
            source: CompletionSource::Demo,
        }
    }
}
