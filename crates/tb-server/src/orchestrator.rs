use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use tb_core::domain::{
    assemble_messages, sanitize, ChatError, ConversationTurn, PromptStore, ReasoningConfig,
    ReasoningEffort, RelayEvent, RequestConfig, Role, SafetyFilter, UpstreamModel,
    UpstreamRequest,
};

use crate::relay::relay;

pub type RelayStream = Pin<Box<dyn Stream<Item = RelayEvent> + Send>>;

// ---------------------------------------------------------------------------
// ChatPipeline: filter, sanitize, assemble, relay
// ---------------------------------------------------------------------------

pub struct ChatPipeline {
    safety: Arc<SafetyFilter>,
    prompts: Arc<dyn PromptStore>,
    upstream: Arc<dyn UpstreamModel>,
    idle_timeout: Duration,
}

impl ChatPipeline {
    pub fn new(
        safety: Arc<SafetyFilter>,
        prompts: Arc<dyn PromptStore>,
        upstream: Arc<dyn UpstreamModel>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            safety,
            prompts,
            upstream,
            idle_timeout,
        }
    }

    /// Runs one chat request. Errors are returned only before streaming
    /// starts; once a stream is returned, failures arrive as
    /// [`RelayEvent::Error`].
    pub async fn handle(
        &self,
        mut history: Vec<ConversationTurn>,
        config: RequestConfig,
    ) -> Result<RelayStream, ChatError> {
        if let Some(turn) = history.iter().find(|t| !t.is_sendable()) {
            return Err(ChatError::Validation(format!(
                "turn {} carries an attachment without data",
                turn.id().map(|id| id.as_str()).unwrap_or("<unnamed>")
            )));
        }

        // Only the newest user turn is screened; earlier turns were screened
        // when they were sent.
        match history.pop() {
            Some(last) if last.role() == Role::User => {
                let verdict = self.safety.evaluate(last.content(), &config.grade_level.id);
                if !verdict.safe {
                    tracing::warn!(
                        grade_level = %config.grade_level.id,
                        reason = verdict.reason_code.map(|r| r.as_str()).unwrap_or("unknown"),
                        category = ?verdict.category,
                        "student message blocked"
                    );
                    return Ok(redirect_stream(verdict.redirect_or_fallback().to_owned()));
                }
                let cleaned = sanitize(last.content());
                history.push(last.with_content(cleaned));
            }
            Some(last) => history.push(last),
            None => {}
        }

        let unsupported = history
            .iter()
            .flat_map(ConversationTurn::attachments)
            .filter(|a| !a.is_image() && !a.is_pdf())
            .count();
        if unsupported > 0 {
            tracing::debug!(unsupported, "attachments with unsupported types omitted");
        }

        let system_prompt = self.prompts.load(&config.grade_level).await?;
        let messages = assemble_messages(&system_prompt, &history, &config.grade_level.range);

        let request = UpstreamRequest {
            model: config.model.id.clone(),
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: true,
            reasoning: config
                .reasoning_requested()
                .then(|| ReasoningConfig::hidden(ReasoningEffort::Medium)),
        };

        tracing::info!(
            model = %request.model,
            grade_level = %config.grade_level.id,
            messages = request.messages.len(),
            reasoning = request.reasoning.is_some(),
            "relaying chat request"
        );

        Ok(Box::pin(relay(
            self.upstream.clone(),
            request,
            self.idle_timeout,
        )))
    }
}

fn redirect_stream(redirect: String) -> RelayStream {
    Box::pin(futures_util::stream::iter([
        RelayEvent::Delta(redirect),
        RelayEvent::Done,
    ]))
}
