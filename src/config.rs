use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Directory holding the `.txt`/`.md` source documents.
    pub dir: PathBuf,
    /// Optional JSON file mapping filenames to collection keys.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
    /// Single-line file recording the hash of the last ingested snapshot.
    #[serde(default = "default_hash_file")]
    pub hash_file: PathBuf,
    /// Separator placed between documents combined into one collection.
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("./knowledge/collection_mappings.json")
}
fn default_hash_file() -> PathBuf {
    PathBuf::from("./data/.knowledge_hash")
}
fn default_separator() -> String {
    "\n\n---\n\n".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Top-K chunks fetched from every live collection.
    #[serde(default = "default_per_collection_k")]
    pub per_collection_k: usize,
    /// Cap on the merged result list across all collections.
    #[serde(default = "default_merged_limit")]
    pub merged_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_collection_k: default_per_collection_k(),
            merged_limit: default_merged_limit(),
        }
    }
}

fn default_per_collection_k() -> usize {
    4
}
fn default_merged_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_base: default_api_base(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    512
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Maximum user-authored turns per conversation, current message included.
    #[serde(default = "default_max_user_turns")]
    pub max_user_turns: usize,
    /// Consecutive uncertain responses before a session is flagged for handoff.
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
    /// Bound on the number of tracked sessions; least recently used are evicted.
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_user_turns: default_max_user_turns(),
            escalation_threshold: default_escalation_threshold(),
            session_capacity: default_session_capacity(),
        }
    }
}

fn default_max_user_turns() -> usize {
    6
}
fn default_escalation_threshold() -> u32 {
    3
}
fn default_session_capacity() -> usize {
    1024
}

/// Contact channels surfaced in fallback messages and suggested links.
#[derive(Debug, Deserialize, Clone)]
pub struct ContactConfig {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    #[serde(default = "default_phone")]
    pub phone: String,
    #[serde(default = "default_whatsapp")]
    pub whatsapp: String,
    #[serde(default = "default_website")]
    pub website: String,
    #[serde(default = "default_contact_url")]
    pub contact_url: String,
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_email")]
    pub email: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            phone: default_phone(),
            whatsapp: default_whatsapp(),
            website: default_website(),
            contact_url: default_contact_url(),
            callback_url: default_callback_url(),
            login_url: default_login_url(),
            email: default_email(),
        }
    }
}

fn default_agent_name() -> String {
    "Neha".to_string()
}
fn default_phone() -> String {
    "+91-8010513511".to_string()
}
fn default_whatsapp() -> String {
    "+91-9205661114".to_string()
}
fn default_website() -> String {
    "https://oorzaayatra.com".to_string()
}
fn default_contact_url() -> String {
    "https://oorzaayatra.com/contact".to_string()
}
fn default_callback_url() -> String {
    "https://oorzaayatra.com/callback".to_string()
}
fn default_login_url() -> String {
    "https://oorzaayatra.com/login".to_string()
}
fn default_email() -> String {
    "support@oorzaayatra.com".to_string()
}

impl ContactConfig {
    pub fn whatsapp_url(&self) -> String {
        let digits: String = self.whatsapp.chars().filter(|c| c.is_ascii_digit()).collect();
        format!("https://wa.me/{}", digits)
    }

    pub fn tel_url(&self) -> String {
        let digits: String = self.phone.chars().filter(|c| c.is_ascii_digit()).collect();
        format!("tel:{}", digits)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.per_collection_k == 0 {
        anyhow::bail!("retrieval.per_collection_k must be >= 1");
    }
    if config.retrieval.merged_limit == 0 {
        anyhow::bail!("retrieval.merged_limit must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, or hash.",
            other
        ),
    }

    // Validate chat gate
    if config.chat.max_user_turns == 0 {
        anyhow::bail!("chat.max_user_turns must be >= 1");
    }
    if config.chat.escalation_threshold == 0 {
        anyhow::bail!("chat.escalation_threshold must be >= 1");
    }
    if config.chat.session_capacity == 0 {
        anyhow::bail!("chat.session_capacity must be >= 1");
    }

    Ok(config)
}
