use serde::Serialize;

use crate::domain::{
    ChatError, GradeLevelId, GradeLevelProfile, ModelId, ModelProfile, RequestConfig,
};

pub const MAX_TEMPERATURE: f64 = 2.0;

// ---------------------------------------------------------------------------
// GenerationDefaults: applied when a request omits a setting
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub enable_reasoning: bool,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 2000,
            enable_reasoning: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigSelection: what the client asked for, before resolution
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigSelection {
    pub model: Option<ModelId>,
    pub grade_level: Option<GradeLevelId>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub enable_reasoning: Option<bool>,
}

// ---------------------------------------------------------------------------
// Catalog: read-only model and grade-level profiles
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    models: Vec<ModelProfile>,
    grade_levels: Vec<GradeLevelProfile>,
    defaults: GenerationDefaults,
}

impl Catalog {
    pub fn new(
        models: Vec<ModelProfile>,
        grade_levels: Vec<GradeLevelProfile>,
        defaults: GenerationDefaults,
    ) -> Self {
        Self {
            models,
            grade_levels,
            defaults,
        }
    }

    pub fn models(&self) -> &[ModelProfile] {
        &self.models
    }

    pub fn grade_levels(&self) -> &[GradeLevelProfile] {
        &self.grade_levels
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    pub fn model(&self, id: &ModelId) -> Option<&ModelProfile> {
        self.models.iter().find(|m| &m.id == id)
    }

    pub fn grade_level(&self, id: &GradeLevelId) -> Option<&GradeLevelProfile> {
        self.grade_levels.iter().find(|g| &g.id == id)
    }

    /// The configured default model, or the first catalog entry.
    pub fn default_model(&self) -> Option<&ModelProfile> {
        match &self.defaults.model {
            Some(id) => self.model(id),
            None => self.models.first(),
        }
    }

    /// Resolves a client selection against the catalog. Profiles always come
    /// from the catalog, never from the client payload.
    pub fn resolve(&self, selection: ConfigSelection) -> Result<RequestConfig, ChatError> {
        let model = match &selection.model {
            Some(id) => self
                .model(id)
                .ok_or_else(|| ChatError::Validation(format!("unknown model {id}")))?,
            None => self
                .default_model()
                .ok_or_else(|| ChatError::Validation("no default model configured".into()))?,
        };

        let grade_level_id = selection
            .grade_level
            .ok_or_else(|| ChatError::Validation("missing grade level".into()))?;
        let grade_level = self.grade_level(&grade_level_id).ok_or_else(|| {
            ChatError::Validation(format!("unknown grade level {grade_level_id}"))
        })?;

        let temperature = selection.temperature.unwrap_or(self.defaults.temperature);
        if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(ChatError::Validation(format!(
                "temperature {temperature} outside 0.0..={MAX_TEMPERATURE}"
            )));
        }

        let max_tokens = selection.max_tokens.unwrap_or(self.defaults.max_tokens);
        if max_tokens == 0 {
            return Err(ChatError::Validation("maxTokens must be positive".into()));
        }

        Ok(RequestConfig {
            model: model.clone(),
            grade_level: grade_level.clone(),
            temperature,
            max_tokens,
            enable_reasoning: selection
                .enable_reasoning
                .unwrap_or(self.defaults.enable_reasoning),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
