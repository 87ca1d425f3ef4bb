/// The idea evaluation pipeline: prompt → completion → parse.
///
/// Stateless and reentrant; concurrent evaluations share nothing but the
/// completion client. Any stage failure ends the run with the originating
/// error. Persisting the result is the caller's job.
use std::fmt;
use std::sync::Arc;

use idea_common::openai::Message;
use tracing::{debug, info, warn};

use crate::completion::CompletionClient;
use crate::error::EvaluationError;
use crate::model::IdeaEvaluation;
use crate::parser;
use crate::prompt::{self, PromptBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prompting,
    Completing,
    Parsing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Prompting => "prompting",
            Stage::Completing => "completing",
            Stage::Parsing => "parsing",
        })
    }
}

pub struct EvaluationPipeline {
    client: Arc<dyn CompletionClient>,
    prompts: PromptBuilder,
    repair_attempts: u32,
}

impl EvaluationPipeline {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            prompts: PromptBuilder::new(),
            repair_attempts: 0,
        }
    }

    /// Allow up to `attempts` follow-up calls when a reply fails to parse or
    /// validate. Zero (the default) means exactly one call per evaluation.
    pub fn with_repair_attempts(mut self, attempts: u32) -> Self {
        self.repair_attempts = attempts;
        self
    }

    pub async fn evaluate(&self, idea: &str) -> Result<IdeaEvaluation, EvaluationError> {
        debug!(stage = %Stage::Prompting, idea_chars = idea.chars().count(), "rendering prompt");
        let mut messages: Vec<Message> = self.prompts.messages(idea);

        let mut repairs = 0;
        loop {
            debug!(stage = %Stage::Completing, repairs, "calling completion service");
            let raw = self
                .client
                .complete(&messages)
                .await
                .inspect_err(|e| warn!(stage = %Stage::Completing, error = %e, "completion failed"))?;

            debug!(stage = %Stage::Parsing, reply_chars = raw.chars().count(), "parsing reply");
            match parser::parse(&raw) {
                Ok(evaluation) => {
                    info!(
                        risk = evaluation.risk_level.as_str(),
                        score = evaluation.profitability_score,
                        repairs,
                        "idea evaluated"
                    );
                    return Ok(evaluation);
                }
                Err(e) if e.is_repairable() && repairs < self.repair_attempts => {
                    repairs += 1;
                    warn!(kind = e.kind(), error = %e, repairs, "reply rejected, asking model to repair");
                    messages.push(Message::assistant(raw));
                    messages.push(Message::user(prompt::repair_instruction(&e.to_string())));
                }
                Err(e) => {
                    if let EvaluationError::MalformedOutput { excerpt, .. } = &e {
                        debug!(excerpt = %excerpt, "unparseable reply");
                    }
                    warn!(stage = %e.stage(), kind = e.kind(), error = %e, "evaluation failed");
                    return Err(e);
                }
            }
        }
    }
}
