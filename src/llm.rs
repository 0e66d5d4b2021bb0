//! Servicio IA compartido sobre Rig (nivel 1 del cliente IA).
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use tracing::{info, warn};

use crate::ai::{CompletionOptions, SharedAiService};
use crate::config::{AppConfig, LlmProvider};

const DEFAULT_SYSTEM_PROMPT: &str = r#"
Eres el asistente del ecosistema judicial Marduk.
Respondes en español, de forma clara y concisa.
Si no conoces la respuesta, dilo explícitamente.
"#;

/// Gestor de LLMs del servicio compartido.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración. Devuelve `None` si
    /// no hay proveedor compartido, si el proveedor no tiene chat o si le
    /// faltan credenciales.
    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        let provider = cfg.shared_provider.clone()?;
        if provider != LlmProvider::OpenAI {
            warn!(
                "LLM_PROVIDER={:?} aún no soporta chat; se desactiva el servicio compartido.",
                provider
            );
            return None;
        }
        if std::env::var("OPENAI_API_KEY").is_err() {
            warn!("LLM_PROVIDER=openai sin OPENAI_API_KEY; se desactiva el servicio compartido.");
            return None;
        }
        info!("Servicio IA compartido: {:?} ({})", provider, cfg.shared_chat_model);
        Some(Self {
            provider,
            chat_model: cfg.shared_chat_model.clone(),
        })
    }

    /// Genera una respuesta a partir de un prompt.
    pub async fn answer(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.answer_with_openai(prompt, options).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            )),
        }
    }

    async fn answer_with_openai(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = openai::Client::from_env();

        let model_name = options
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(self.chat_model.as_str());
        let preamble = options.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let agent = client.agent(model_name).preamble(preamble).build();

        let answer = agent.prompt(prompt).await?;
        Ok(answer)
    }
}

#[async_trait]
impl SharedAiService for LlmManager {
    fn name(&self) -> &str {
        match self.provider {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Ollama => "ollama",
        }
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.answer(prompt, options).await
    }
}
