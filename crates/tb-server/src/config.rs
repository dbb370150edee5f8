use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default = "default_grade_levels")]
    pub grade_levels: Vec<GradeLevelConfig>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            prompts: PromptsConfig::default(),
            logging: LoggingConfig::default(),
            defaults: DefaultsConfig::default(),
            models: default_models(),
            grade_levels: default_grade_levels(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Falls back to the `OPENROUTER_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub site_url: String,
    pub app_title: String,
    pub connect_timeout_ms: u64,
    /// Time allowed for the upstream to start responding.
    pub request_timeout_ms: u64,
    /// Longest silence tolerated between two streamed fragments.
    pub idle_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_owned(),
            api_key: None,
            site_url: "http://localhost:3000".to_owned(),
            app_title: "ZigAI - Educational AI Assistant".to_owned(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 60_000,
            idle_timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub dir: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("prompts"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "json".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub enable_reasoning: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 2000,
            enable_reasoning: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub supports_reasoning: bool,
    #[serde(default)]
    pub cost_input_per_million: f64,
    #[serde(default)]
    pub cost_output_per_million: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GradeLevelConfig {
    pub id: String,
    pub name: String,
    pub range: String,
    pub prompt_file: String,
    #[serde(default)]
    pub blocked_terms: Vec<String>,
    /// Redirect shown when a blocked term matches.
    pub redirect: Option<String>,
}

fn model(
    id: &str,
    name: &str,
    provider: &str,
    supports_reasoning: bool,
    cost: (f64, f64),
) -> ModelConfig {
    ModelConfig {
        id: id.to_owned(),
        name: name.to_owned(),
        provider: provider.to_owned(),
        supports_reasoning,
        cost_input_per_million: cost.0,
        cost_output_per_million: cost.1,
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        model("anthropic/claude-opus-4.1", "Claude Opus 4.1", "Anthropic", true, (30.0, 150.0)),
        model("anthropic/claude-sonnet-4", "Claude Sonnet 4", "Anthropic", true, (15.0, 75.0)),
        model("openai/gpt-4o", "GPT-4o", "OpenAI", false, (5.0, 15.0)),
        model("openai/gpt-5", "GPT-5", "OpenAI", true, (20.0, 100.0)),
        model("google/gemini-2.5-flash", "Gemini 2.5 Flash", "Google", true, (1.0, 5.0)),
        model("google/gemini-2.5-pro", "Gemini 2.5 Pro", "Google", true, (10.0, 50.0)),
    ]
}

fn grade_level(id: &str, name: &str, range: &str, prompt_file: &str) -> GradeLevelConfig {
    GradeLevelConfig {
        id: id.to_owned(),
        name: name.to_owned(),
        range: range.to_owned(),
        prompt_file: prompt_file.to_owned(),
        blocked_terms: Vec::new(),
        redirect: None,
    }
}

fn default_grade_levels() -> Vec<GradeLevelConfig> {
    vec![
        grade_level("elementary", "Elementary School", "1st - 5th Grade", "elementary_1-5.md"),
        grade_level("middle", "Middle School", "6th - 8th Grade", "middle_6-8.md"),
        grade_level("high", "High School", "9th - 12th Grade", "high_9-12.md"),
    ]
}
