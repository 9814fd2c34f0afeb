use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "form-autofill",
    version,
    about = "Semi-automated filling of multi-step web application forms"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: form-autofill.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Path to the profile YAML file
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// LLM API endpoint (Ollama-compatible /api/generate)
    #[arg(long, global = true)]
    pub llm_endpoint: Option<String>,

    /// LLM model name
    #[arg(long, global = true)]
    pub llm_model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the WebSocket server the browser extension connects to
    Serve {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Browser driver endpoint executing the actual page actions
        #[arg(long)]
        driver_endpoint: Option<String>,

        /// Mapping backend: mock or llm
        #[arg(long, default_value = "llm")]
        mapper: String,
    },

    /// Analyze a captured snapshot JSON file offline and print the mapping
    Analyze {
        /// Path to a snapshot JSON file
        #[arg(long)]
        snapshot: String,

        /// Mapping backend: mock or llm
        #[arg(long, default_value = "mock")]
        mapper: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `form-autofill.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fill: FillConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_driver")]
    pub driver_endpoint: String,

    #[serde(default = "default_profile_path")]
    pub profile_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            driver_endpoint: default_driver(),
            profile_path: default_profile_path(),
        }
    }
}

/// Fill-run tunables. Delays in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillConfig {
    #[serde(default = "default_delay_min")]
    pub fill_delay_min_ms: u64,

    #[serde(default = "default_delay_max")]
    pub fill_delay_max_ms: u64,

    /// Fuzzy-match score cutoff, 0-100.
    #[serde(default = "default_threshold")]
    pub match_threshold: u8,

    #[serde(default = "default_combobox_timeout")]
    pub combobox_open_timeout_ms: u64,

    #[serde(default = "default_settle")]
    pub add_settle_delay_ms: u64,

    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_ms: u64,

    /// Hard ceiling on total entries per repeatable section.
    #[serde(default = "default_max_entries")]
    pub max_section_entries: usize,

    #[serde(default = "default_resume_path")]
    pub resume_path: String,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            fill_delay_min_ms: default_delay_min(),
            fill_delay_max_ms: default_delay_max(),
            match_threshold: default_threshold(),
            combobox_open_timeout_ms: default_combobox_timeout(),
            add_settle_delay_ms: default_settle(),
            extraction_timeout_ms: default_extraction_timeout(),
            max_section_entries: default_max_entries(),
            resume_path: default_resume_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
        }
    }
}

// Serde default helpers
fn default_bind() -> String { "127.0.0.1:8765".to_string() }
fn default_driver() -> String { "http://127.0.0.1:9333/command".to_string() }
fn default_profile_path() -> String { "profile.yaml".to_string() }
fn default_delay_min() -> u64 { 200 }
fn default_delay_max() -> u64 { 800 }
fn default_threshold() -> u8 { 70 }
fn default_combobox_timeout() -> u64 { 3000 }
fn default_settle() -> u64 { 1500 }
fn default_extraction_timeout() -> u64 { 10_000 }
fn default_max_entries() -> usize { 10 }
fn default_resume_path() -> String { "resume.pdf".to_string() }
fn default_llm_endpoint() -> String { "http://localhost:11434/api/generate".to_string() }
fn default_llm_model() -> String { "qwen2.5:7b".to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("form-autofill.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

/// Build the orchestrator's settings from the fill config.
pub fn fill_settings(fill: &FillConfig) -> crate::orchestrator::orchestrator::FillSettings {
    crate::orchestrator::orchestrator::FillSettings {
        fill_delay_min_ms: fill.fill_delay_min_ms,
        fill_delay_max_ms: fill.fill_delay_max_ms,
        match_threshold: fill.match_threshold,
        add_settle_delay_ms: fill.add_settle_delay_ms,
        extraction_timeout_ms: fill.extraction_timeout_ms,
        max_section_entries: fill.max_section_entries,
        resume_path: fill.resume_path.clone(),
    }
}
