//! Writer/moderator revision cycle.
//!
//! A draft is produced from the seed title, then repeatedly shown to the
//! moderator until it approves or the revision budget runs out. Convergence
//! is checked before the iteration counter increments, so an approval on the
//! final round still counts as converged.

use tracing::{debug, warn};

use crate::assistant::{AssistantError, TextGenerator};

/// Moderator replies recognized as approval, pre-normalization.
pub fn default_approval_tokens() -> Vec<String> {
    ["ok", "ок", "okay", "хорошо"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Bounds and approval vocabulary for one revision cycle.
#[derive(Debug, Clone)]
pub struct RevisionPolicy {
    pub max_revisions: u32,
    approval_tokens: Vec<String>,
}

impl RevisionPolicy {
    /// Tokens are normalized (trimmed, lowercased) once at construction.
    pub fn new(max_revisions: u32, approval_tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            max_revisions,
            approval_tokens: approval_tokens
                .into_iter()
                .map(|token| normalize(&token))
                .collect(),
        }
    }

    /// Whether a moderator reply counts as approval.
    ///
    /// Any other reply, the empty string included, asks for another round;
    /// it is never an error.
    pub fn is_approval(&self, feedback: &str) -> bool {
        let normalized = normalize(feedback);
        self.approval_tokens.iter().any(|token| *token == normalized)
    }
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        Self::new(5, default_approval_tokens())
    }
}

fn normalize(reply: &str) -> String {
    reply.trim().to_lowercase()
}

/// Result of one revision cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionOutcome {
    pub draft: String,
    pub converged: bool,
    pub iterations_used: u32,
    pub last_feedback: String,
}

/// Build the writer prompt for a revision round.
pub fn build_revision_prompt(draft: &str, feedback: &str) -> String {
    format!("Текст:\n{draft}\n\nКомментарий:\n{feedback}")
}

/// Drive the writer/moderator exchange for `title` to convergence or
/// exhaustion.
///
/// The moderator is consulted at most `max_revisions + 1` times and the
/// writer re-invoked at most `max_revisions` times beyond the initial draft.
pub async fn revise<T: TextGenerator>(
    text: &T,
    writer_id: &str,
    moderator_id: &str,
    title: &str,
    policy: &RevisionPolicy,
) -> Result<RevisionOutcome, AssistantError> {
    let mut draft = text.call(writer_id, title).await?;
    let mut iterations_used = 0u32;

    loop {
        let feedback = text.call(moderator_id, &draft).await?;
        debug!(iterations_used, feedback_len = feedback.len(), "moderator replied");

        if policy.is_approval(&feedback) {
            return Ok(RevisionOutcome {
                draft,
                converged: true,
                iterations_used,
                last_feedback: feedback,
            });
        }
        if iterations_used >= policy.max_revisions {
            warn!(
                max_revisions = policy.max_revisions,
                "revision budget exhausted without approval"
            );
            return Ok(RevisionOutcome {
                draft,
                converged: false,
                iterations_used,
                last_feedback: feedback,
            });
        }

        let prompt = build_revision_prompt(&draft, &feedback);
        draft = text.call(writer_id, &prompt).await?;
        iterations_used += 1;
    }
}
