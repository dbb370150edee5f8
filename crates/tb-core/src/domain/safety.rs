//! Pattern-based content filtering for inbound student messages.
//!
//! Rules are evaluated top to bottom and the first match wins. Content-risk
//! rules run first, then the per-grade-level blocked terms, then the
//! unsafe-situation rules.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::GradeLevelId;

pub const INAPPROPRIATE_CONTENT_REDIRECT: &str =
    "I can only help with educational topics. What subject would you like to study?";
pub const SAFETY_CONCERN_REDIRECT: &str =
    "If someone is making you uncomfortable, please talk to a trusted adult. Now, let's focus on your studies!";
/// Used when a blocking verdict carries no redirect of its own.
pub const FALLBACK_REDIRECT: &str =
    "Let's focus on your studies! What subject would you like help with?";

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InappropriateContent,
    AgeInappropriate,
    SafetyConcern,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InappropriateContent => "inappropriate_content",
            ReasonCode::AgeInappropriate => "age_inappropriate",
            ReasonCode::SafetyConcern => "safety_concern",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    SubstanceSynthesis,
    AdultContent,
    Violence,
    SelfHarm,
    PersonalInfo,
    GradeLevelTerm,
    InPersonMeeting,
    Secrecy,
    PhotoRequest,
    LocationProbe,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyVerdict {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_message: Option<String>,
    #[serde(skip)]
    pub category: Option<RuleCategory>,
}

impl SafetyVerdict {
    pub fn allow() -> Self {
        Self {
            safe: true,
            reason_code: None,
            redirect_message: None,
            category: None,
        }
    }

    pub fn block(reason: ReasonCode, category: RuleCategory, redirect: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason_code: Some(reason),
            redirect_message: Some(redirect.into()),
            category: Some(category),
        }
    }

    /// The message shown to the student when this verdict blocks.
    pub fn redirect_or_fallback(&self) -> &str {
        self.redirect_message.as_deref().unwrap_or(FALLBACK_REDIRECT)
    }
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

pub struct SafetyRule {
    pub category: RuleCategory,
    pub regex: Regex,
}

fn rule(category: RuleCategory, pattern: &str) -> SafetyRule {
    SafetyRule {
        category,
        regex: Regex::new(pattern).expect("Valid regex pattern"),
    }
}

// Word boundaries, digits and word classes are ASCII-only.
static CONTENT_RULES: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        rule(
            RuleCategory::SubstanceSynthesis,
            r"(?i-u)\b(make|create|cook|produce)\s+(meth|cocaine|heroin|lsd|mdma|ecstasy|fentanyl)\b",
        ),
        rule(
            RuleCategory::SubstanceSynthesis,
            r"(?i-u)\bmeth\s+(recipe|ingredients|lab)\b",
        ),
        rule(
            RuleCategory::AdultContent,
            r"(?i-u)\b(porn|pornography|xxx|nude\s+photos)\b",
        ),
        rule(
            RuleCategory::Violence,
            r"(?i-u)\bhow\s+to\s+(kill|murder|poison|harm)\s+(someone|people|myself)\b",
        ),
        rule(
            RuleCategory::SelfHarm,
            r"(?i-u)\b(suicide|self-harm)\s+(method|instruction|guide)\b",
        ),
        // phone numbers
        rule(RuleCategory::PersonalInfo, r"(?-u)\b\d{3}[-.]?\d{3}[-.]?\d{4}\b"),
        // email addresses
        rule(
            RuleCategory::PersonalInfo,
            r"(?i-u)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b",
        ),
        // street addresses
        rule(
            RuleCategory::PersonalInfo,
            r"(?i-u)\b\d{1,5}\s+[\w\s]+(?:street|st|avenue|ave|road|rd|drive|dr|lane|ln|boulevard|blvd)\b",
        ),
    ]
});

static SITUATION_RULES: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        rule(RuleCategory::InPersonMeeting, r"(?i)meet.*in.*person"),
        rule(RuleCategory::Secrecy, r"(?i)don't.*tell.*parent"),
        rule(RuleCategory::Secrecy, r"(?i)keep.*secret"),
        rule(RuleCategory::PhotoRequest, r"(?i)send.*photo"),
        rule(RuleCategory::LocationProbe, r"(?i)where.*do.*you.*live"),
    ]
});

// ---------------------------------------------------------------------------
// GradeRestriction: per-grade-level blocked terms
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GradeRestriction {
    /// Matched as lowercase substrings of the message.
    pub blocked_terms: Vec<String>,
    pub redirect: String,
}

impl GradeRestriction {
    pub fn new(blocked_terms: Vec<String>, redirect: impl Into<String>) -> Self {
        Self {
            blocked_terms: blocked_terms
                .into_iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            redirect: redirect.into(),
        }
    }

    fn first_blocked_term(&self, lowered: &str) -> Option<&str> {
        self.blocked_terms
            .iter()
            .find(|term| lowered.contains(term.as_str()))
            .map(String::as_str)
    }
}

/// Redirects used by the built-in grade levels.
pub fn default_grade_redirect(grade_level: &str) -> Option<&'static str> {
    match grade_level {
        "elementary" => {
            Some("Let's focus on your schoolwork! What subject would you like help with?")
        }
        "middle" => Some(
            "That's a topic better discussed with a parent or teacher. Let's work on your studies instead!",
        ),
        "high" => Some("I'm here to help with academic topics. Let's focus on your coursework."),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SafetyFilter
// ---------------------------------------------------------------------------

pub struct SafetyFilter {
    restrictions: HashMap<GradeLevelId, GradeRestriction>,
}

impl SafetyFilter {
    pub fn new(restrictions: HashMap<GradeLevelId, GradeRestriction>) -> Self {
        Self { restrictions }
    }

    /// Evaluates raw, unsanitized text. Pure: same inputs, same verdict.
    pub fn evaluate(&self, text: &str, grade_level: &GradeLevelId) -> SafetyVerdict {
        if let Some(r) = CONTENT_RULES.iter().find(|r| r.regex.is_match(text)) {
            return SafetyVerdict::block(
                ReasonCode::InappropriateContent,
                r.category,
                INAPPROPRIATE_CONTENT_REDIRECT,
            );
        }

        if let Some(restriction) = self.restrictions.get(grade_level) {
            let lowered = text.to_lowercase();
            if restriction.first_blocked_term(&lowered).is_some() {
                return SafetyVerdict::block(
                    ReasonCode::AgeInappropriate,
                    RuleCategory::GradeLevelTerm,
                    restriction.redirect.clone(),
                );
            }
        }

        if let Some(r) = SITUATION_RULES.iter().find(|r| r.regex.is_match(text)) {
            return SafetyVerdict::block(
                ReasonCode::SafetyConcern,
                r.category,
                SAFETY_CONCERN_REDIRECT,
            );
        }

        SafetyVerdict::allow()
    }

    pub fn restriction(&self, grade_level: &GradeLevelId) -> Option<&GradeRestriction> {
        self.restrictions.get(grade_level)
    }
}

impl Default for SafetyFilter {
    /// Built-in grade levels with empty blocked-term lists.
    fn default() -> Self {
        let restrictions = ["elementary", "middle", "high"]
            .into_iter()
            .filter_map(|id| {
                default_grade_redirect(id)
                    .map(|redirect| (GradeLevelId::new(id), GradeRestriction::new(vec![], redirect)))
            })
            .collect();
        Self::new(restrictions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
