use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use tb_core::domain::{
    default_grade_redirect, ApiKey, Catalog, GenerationDefaults, GradeLevelId, GradeLevelProfile,
    GradeRestriction, ModelId, ModelProfile, SafetyFilter, TokenCost, FALLBACK_REDIRECT,
    MAX_TEMPERATURE,
};

use crate::config::AppConfig;
use crate::handler::AppState;
use crate::orchestrator::ChatPipeline;
use crate::prompts::FsPromptStore;
use crate::upstream::OpenRouterUpstream;

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

// ---------------------------------------------------------------------------
// UpstreamSettings: how to reach the hosted model API
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
    pub site_url: String,
    pub app_title: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
}

// ---------------------------------------------------------------------------
// RuntimeConfig: fully validated runtime configuration
// ---------------------------------------------------------------------------

pub struct RuntimeConfig {
    pub catalog: Catalog,
    pub safety: SafetyFilter,
    pub upstream: UpstreamSettings,
    pub prompts_dir: PathBuf,
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
}

// ---------------------------------------------------------------------------
// into_runtime: converts raw AppConfig into validated RuntimeConfig
// ---------------------------------------------------------------------------

pub fn into_runtime(config: AppConfig) -> Result<RuntimeConfig, anyhow::Error> {
    let env_key = std::env::var(API_KEY_ENV).ok();
    into_runtime_with_key(config, env_key)
}

/// Same as [`into_runtime`] with the environment fallback for the API key
/// passed in explicitly.
pub fn into_runtime_with_key(
    config: AppConfig,
    env_api_key: Option<String>,
) -> Result<RuntimeConfig, anyhow::Error> {
    ensure!(!config.models.is_empty(), "at least one model required");
    ensure!(
        !config.grade_levels.is_empty(),
        "at least one grade level required"
    );
    ensure!(
        !config.upstream.base_url.trim().is_empty(),
        "upstream base_url must not be empty"
    );
    for (name, value) in [
        ("connect_timeout_ms", config.upstream.connect_timeout_ms),
        ("request_timeout_ms", config.upstream.request_timeout_ms),
        ("idle_timeout_ms", config.upstream.idle_timeout_ms),
    ] {
        ensure!(value > 0, "upstream {name} must be positive");
    }
    ensure!(
        matches!(config.logging.format.as_str(), "json" | "pretty"),
        "unknown logging format: {}",
        config.logging.format
    );
    ensure!(
        (0.0..=MAX_TEMPERATURE).contains(&config.defaults.temperature),
        "default temperature must be within 0.0..={MAX_TEMPERATURE}"
    );
    ensure!(
        config.defaults.max_tokens > 0,
        "default max_tokens must be positive"
    );

    // Detect duplicate model IDs
    let mut seen_models = HashSet::with_capacity(config.models.len());
    for model in &config.models {
        ensure!(
            seen_models.insert(&model.id),
            "duplicate model id: {}",
            model.id
        );
    }

    // Detect duplicate grade level IDs
    let mut seen_grades = HashSet::with_capacity(config.grade_levels.len());
    for grade in &config.grade_levels {
        ensure!(
            seen_grades.insert(&grade.id),
            "duplicate grade level id: {}",
            grade.id
        );
        ensure!(
            !grade.prompt_file.trim().is_empty(),
            "grade level {} has no prompt_file",
            grade.id
        );
    }

    if let Some(default_model) = &config.defaults.model {
        ensure!(
            seen_models.contains(default_model),
            "default model {default_model} is not in the model catalog"
        );
    }

    // Convert models → ModelProfile
    let models: Vec<ModelProfile> = config
        .models
        .iter()
        .map(|m| ModelProfile {
            id: ModelId::new(&m.id),
            display_name: m.name.clone(),
            provider: m.provider.clone(),
            supports_reasoning: m.supports_reasoning,
            cost_per_million_tokens: TokenCost {
                input: m.cost_input_per_million,
                output: m.cost_output_per_million,
            },
        })
        .collect();

    // Convert grade levels → GradeLevelProfile + per-grade restrictions
    let mut restrictions = HashMap::with_capacity(config.grade_levels.len());
    let grade_levels: Vec<GradeLevelProfile> = config
        .grade_levels
        .into_iter()
        .map(|g| {
            let id = GradeLevelId::new(g.id);
            let redirect = g
                .redirect
                .or_else(|| default_grade_redirect(id.as_str()).map(str::to_owned))
                .unwrap_or_else(|| FALLBACK_REDIRECT.to_owned());
            restrictions.insert(id.clone(), GradeRestriction::new(g.blocked_terms, redirect));
            GradeLevelProfile {
                id,
                display_name: g.name,
                range: g.range,
                prompt_resource_key: g.prompt_file,
            }
        })
        .collect();

    let defaults = GenerationDefaults {
        model: config.defaults.model.map(ModelId::new),
        temperature: config.defaults.temperature,
        max_tokens: config.defaults.max_tokens,
        enable_reasoning: config.defaults.enable_reasoning,
    };

    let api_key = config
        .upstream
        .api_key
        .or(env_api_key)
        .filter(|k| !k.is_empty())
        .map(ApiKey::new);

    let upstream = UpstreamSettings {
        base_url: config.upstream.base_url.trim_end_matches('/').to_owned(),
        api_key,
        site_url: config.upstream.site_url,
        app_title: config.upstream.app_title,
        connect_timeout: Duration::from_millis(config.upstream.connect_timeout_ms),
        request_timeout: Duration::from_millis(config.upstream.request_timeout_ms),
        idle_timeout: Duration::from_millis(config.upstream.idle_timeout_ms),
    };

    Ok(RuntimeConfig {
        catalog: Catalog::new(models, grade_levels, defaults),
        safety: SafetyFilter::new(restrictions),
        upstream,
        prompts_dir: config.prompts.dir,
        listen_addr: config.server.listen,
        log_level: config.logging.level,
        log_format: config.logging.format,
    })
}

// ---------------------------------------------------------------------------
// build_app_state: wires the runtime config into shared handler state
// ---------------------------------------------------------------------------

pub fn build_app_state(runtime: RuntimeConfig) -> Result<Arc<AppState>, anyhow::Error> {
    let idle_timeout = runtime.upstream.idle_timeout;
    let upstream = OpenRouterUpstream::new(runtime.upstream)?;
    let prompts = FsPromptStore::new(runtime.prompts_dir);

    let pipeline = ChatPipeline::new(
        Arc::new(runtime.safety),
        Arc::new(prompts),
        Arc::new(upstream),
        idle_timeout,
    );

    Ok(Arc::new(AppState {
        pipeline,
        catalog: runtime.catalog,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GradeLevelConfig, ModelConfig};

    fn make_config() -> AppConfig {
        AppConfig::default()
    }

    fn grade(id: &str) -> GradeLevelConfig {
        GradeLevelConfig {
            id: id.to_owned(),
            name: id.to_owned(),
            range: "1st - 5th Grade".to_owned(),
            prompt_file: format!("{id}.md"),
            blocked_terms: Vec::new(),
            redirect: None,
        }
    }

    fn model(id: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_owned(),
            name: id.to_owned(),
            provider: "Test".to_owned(),
            supports_reasoning: false,
            cost_input_per_million: 0.0,
            cost_output_per_million: 0.0,
        }
    }

    fn expect_err(config: AppConfig, needle: &str) {
        match into_runtime_with_key(config, None) {
            Err(e) => assert!(
                e.to_string().contains(needle),
                "expected {needle:?} in {e}"
            ),
            Ok(_) => panic!("expected error containing {needle:?}"),
        }
    }

    #[test]
    fn test_valid_config_conversion() {
        let runtime = into_runtime_with_key(make_config(), None).expect("default config is valid");

        assert_eq!(runtime.catalog.models().len(), 6);
        assert_eq!(runtime.catalog.grade_levels().len(), 3);
        assert_eq!(runtime.listen_addr, "0.0.0.0:3000");
        assert_eq!(runtime.upstream.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(runtime.upstream.idle_timeout, Duration::from_secs(120));
        assert!(runtime.upstream.api_key.is_none());
        assert_eq!(runtime.prompts_dir, PathBuf::from("prompts"));

        let elementary = GradeLevelId::new("elementary");
        let restriction = runtime.safety.restriction(&elementary).unwrap();
        assert!(restriction.blocked_terms.is_empty());
        assert_eq!(
            restriction.redirect,
            "Let's focus on your schoolwork! What subject would you like help with?"
        );
    }

    #[test]
    fn test_api_key_precedence() {
        let runtime =
            into_runtime_with_key(make_config(), Some("sk-env".to_owned())).unwrap();
        assert_eq!(runtime.upstream.api_key, Some(ApiKey::new("sk-env")));

        let mut config = make_config();
        config.upstream.api_key = Some("sk-file".to_owned());
        let runtime = into_runtime_with_key(config, Some("sk-env".to_owned())).unwrap();
        assert_eq!(runtime.upstream.api_key, Some(ApiKey::new("sk-file")));

        let mut config = make_config();
        config.upstream.api_key = Some(String::new());
        let runtime = into_runtime_with_key(config, None).unwrap();
        assert!(runtime.upstream.api_key.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = make_config();
        config.upstream.base_url = "http://127.0.0.1:9000/v1/".to_owned();
        let runtime = into_runtime_with_key(config, None).unwrap();
        assert_eq!(runtime.upstream.base_url, "http://127.0.0.1:9000/v1");
    }

    #[test]
    fn test_blocked_terms_wired_into_filter() {
        let mut config = make_config();
        config.grade_levels = vec![GradeLevelConfig {
            blocked_terms: vec!["Horror".to_owned()],
            redirect: Some("Back to class!".to_owned()),
            ..grade("elementary")
        }];

        let runtime = into_runtime_with_key(config, None).unwrap();
        let verdict = runtime
            .safety
            .evaluate("a horror story", &GradeLevelId::new("elementary"));
        assert!(!verdict.safe);
        assert_eq!(verdict.redirect_message.as_deref(), Some("Back to class!"));
    }

    #[test]
    fn test_custom_grade_level_gets_fallback_redirect() {
        let mut config = make_config();
        config.grade_levels.push(GradeLevelConfig {
            blocked_terms: vec!["exam answers".to_owned()],
            ..grade("college")
        });

        let runtime = into_runtime_with_key(config, None).unwrap();
        let restriction = runtime
            .safety
            .restriction(&GradeLevelId::new("college"))
            .unwrap();
        assert_eq!(restriction.redirect, FALLBACK_REDIRECT);
    }

    #[test]
    fn test_empty_catalogs_rejected() {
        let mut config = make_config();
        config.models.clear();
        expect_err(config, "at least one model required");

        let mut config = make_config();
        config.grade_levels.clear();
        expect_err(config, "at least one grade level required");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut config = make_config();
        config.models.push(model("openai/gpt-4o"));
        expect_err(config, "duplicate model id");

        let mut config = make_config();
        config.grade_levels.push(grade("middle"));
        expect_err(config, "duplicate grade level id");
    }

    #[test]
    fn test_unknown_default_model_rejected() {
        let mut config = make_config();
        config.defaults.model = Some("nobody/unknown".to_owned());
        expect_err(config, "not in the model catalog");
    }

    #[test]
    fn test_invalid_defaults_rejected() {
        let mut config = make_config();
        config.defaults.temperature = 3.0;
        expect_err(config, "default temperature");

        let mut config = make_config();
        config.defaults.max_tokens = 0;
        expect_err(config, "default max_tokens");

        let mut config = make_config();
        config.logging.format = "xml".to_owned();
        expect_err(config, "unknown logging format");

        let mut config = make_config();
        config.grade_levels[0].prompt_file = " ".to_owned();
        expect_err(config, "has no prompt_file");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = make_config();
        config.upstream.connect_timeout_ms = 0;
        expect_err(config, "upstream connect_timeout_ms must be positive");

        let mut config = make_config();
        config.upstream.request_timeout_ms = 0;
        expect_err(config, "upstream request_timeout_ms must be positive");

        let mut config = make_config();
        config.upstream.idle_timeout_ms = 0;
        expect_err(config, "upstream idle_timeout_ms must be positive");
    }
}
