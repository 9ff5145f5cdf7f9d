use chrono::Utc;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::assistant::{AssistantError, TextGenerator};
use crate::config::TabAssistants;
use crate::error::PeroError;
use crate::image::Illustrator;
use crate::revision::{RevisionPolicy, revise};
use crate::sheets::{
    COL_CONTENT, COL_IMAGE_URL, COL_ITERATION, COL_LOCK, COL_MODERATOR_NOTE, COL_STATUS,
    LockStamp, RowStatus, WorkItem, WorkItemStore,
};

/// What one `process_next` invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No eligible row existed, or the acquisition race was lost.
    /// A normal outcome, not an error.
    Idle,
    /// The row reached a terminal text status and was persisted.
    Completed { row: u32, status: RowStatus },
    /// A defined item-level failure: the row was marked `Error` with the
    /// reason recorded, and its lock was cleared.
    Failed { row: u32, reason: String },
}

/// The illustration half of the pipeline: which assistant writes the brief
/// and what turns the brief into a hosted image.
pub struct IllustrationStep<I> {
    pub brief_assistant_id: String,
    pub pipeline: I,
}

/// Defined item-level failures; these mark the row `Error` instead of
/// aborting the run.
#[derive(Debug, thiserror::Error)]
enum ItemFailure {
    #[error("row has an empty Title")]
    EmptyTitle,

    #[error("text generation failed: {0}")]
    Text(#[from] AssistantError),
}

/// Drives one work item at a time: acquire, revise, illustrate, persist,
/// unlock.
pub struct RowOrchestrator<S, T, I> {
    store: S,
    text: T,
    /// `None` when image generation is disabled by configuration.
    illustration: Option<IllustrationStep<I>>,
    policy: RevisionPolicy,
    lock_ttl_minutes: i64,
}

impl<S, T, I> RowOrchestrator<S, T, I>
where
    S: WorkItemStore,
    T: TextGenerator,
    I: Illustrator,
{
    pub fn new(
        store: S,
        text: T,
        illustration: Option<IllustrationStep<I>>,
        policy: RevisionPolicy,
        lock_ttl_minutes: i64,
    ) -> Self {
        Self {
            store,
            text,
            illustration,
            policy,
            lock_ttl_minutes,
        }
    }

    /// Process every configured tab, consuming at most `per_run_rows` rows
    /// per tab. Returns the non-idle outcomes in processing order.
    pub async fn run_once(
        &self,
        tabs: &[TabAssistants],
        per_run_rows: u32,
    ) -> Result<Vec<RunOutcome>, PeroError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        async {
            let mut outcomes = Vec::new();
            for tab in tabs {
                for _ in 0..per_run_rows {
                    match self.process_next(tab).await? {
                        RunOutcome::Idle => break,
                        outcome => outcomes.push(outcome),
                    }
                }
            }
            if outcomes.is_empty() {
                info!("no rows processed in this activation");
            }
            Ok(outcomes)
        }
        .instrument(span)
        .await
    }

    /// Acquire and fully process at most one `Prepared` row of `tab`.
    ///
    /// Every path after acquisition ends either in the final batch (which
    /// clears the lock) or in an explicit release. A store failure is the
    /// one exception; the stamp's TTL then reclaims the row.
    pub async fn process_next(&self, tab: &TabAssistants) -> Result<RunOutcome, PeroError> {
        let Some(item) = self.store.find_prepared(&tab.tab).await? else {
            info!(tab = %tab.tab, "no prepared rows available");
            return Ok(RunOutcome::Idle);
        };

        let stamp = LockStamp::until(Utc::now(), self.lock_ttl_minutes);
        if !self.store.try_acquire(&tab.tab, item.row, &stamp).await? {
            info!(tab = %tab.tab, row = item.row, "lost the acquisition race, yielding");
            return Ok(RunOutcome::Idle);
        }

        match self.process_acquired(tab, &item).await {
            Ok((status, fields)) => {
                if let Err(err) = self.store.batch_update(&tab.tab, item.row, &fields).await {
                    error!(tab = %tab.tab, row = item.row, error = %err, "final persistence failed");
                    self.release_quietly(&tab.tab, item.row).await;
                    return Err(err.into());
                }
                info!(tab = %tab.tab, row = item.row, %status, "row processed");
                Ok(RunOutcome::Completed {
                    row: item.row,
                    status,
                })
            }
            Err(failure) => {
                warn!(tab = %tab.tab, row = item.row, error = %failure, "row failed");
                let reason = failure.to_string();
                let fields = [
                    (COL_STATUS, RowStatus::Error.as_sheet_value().to_string()),
                    (COL_MODERATOR_NOTE, reason.clone()),
                    (COL_LOCK, String::new()),
                ];
                if let Err(err) = self.store.batch_update(&tab.tab, item.row, &fields).await {
                    error!(tab = %tab.tab, row = item.row, error = %err, "failed to record row failure");
                    self.release_quietly(&tab.tab, item.row).await;
                    return Err(err.into());
                }
                Ok(RunOutcome::Failed {
                    row: item.row,
                    reason,
                })
            }
        }
    }

    /// Everything between acquisition and persistence. Returns the terminal
    /// text status and the full cell batch, lock clearing included.
    async fn process_acquired(
        &self,
        tab: &TabAssistants,
        item: &WorkItem,
    ) -> Result<(RowStatus, Vec<(&'static str, String)>), ItemFailure> {
        if item.title.is_empty() {
            return Err(ItemFailure::EmptyTitle);
        }

        let outcome = revise(
            &self.text,
            &tab.writer_assistant_id,
            &tab.moderator_assistant_id,
            &item.title,
            &self.policy,
        )
        .await?;
        let status = if outcome.converged {
            RowStatus::Written
        } else {
            RowStatus::WrittenNotModerated
        };

        let image_url = self.illustrate(&outcome.draft, &item.title).await;

        Ok((
            status,
            vec![
                (COL_CONTENT, outcome.draft),
                (COL_IMAGE_URL, image_url),
                (COL_STATUS, status.as_sheet_value().to_string()),
                (COL_ITERATION, outcome.iterations_used.to_string()),
                (COL_MODERATOR_NOTE, outcome.last_feedback),
                (COL_LOCK, String::new()),
            ],
        ))
    }

    /// Best-effort illustration. Any failure downgrades to an empty URL and
    /// never reverts the text outcome.
    async fn illustrate(&self, draft: &str, title: &str) -> String {
        let Some(step) = &self.illustration else {
            info!("image generation disabled, skipping illustration");
            return String::new();
        };

        let brief = match self.text.call(&step.brief_assistant_id, draft).await {
            Ok(brief) => brief,
            Err(err) => {
                warn!(error = %err, "brief generation failed, keeping the text result");
                return String::new();
            }
        };
        match step.pipeline.illustrate(&brief, title).await {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "illustration failed, keeping the text result");
                String::new()
            }
        }
    }

    async fn release_quietly(&self, tab: &str, row: u32) {
        if let Err(err) = self.store.release(tab, row).await {
            warn!(tab, row, error = %err, "lock release failed; the TTL will reclaim it");
        }
    }
}
