//! Engine orchestrator
//!
//! `EngineManager` is the serialized front door to the deterministic
//! core: it owns the per-agent records and the parameter singleton behind
//! async locks, hands out monotonic event sequence numbers, and runs the
//! guard/pause/validation gauntlet before any record is touched. Every
//! mutation is staged on a copy and committed only on success, so callers
//! observe either the full update or none of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::checkpoint::{self, Checkpoint, ReplayEvent};
use super::error::EngineError;
use super::guard;
use super::params::{EngineParams, ParamsPatch};
use super::stats::{FeedbackEvent, ReputationStats, TrustTier, UpdateOutcome, SCORE_MAX};
use crate::identity::{client_commitment, Identity};
use crate::registry::AgentDirectory;

/// Token-amount context may carry at most this many decimals.
pub const MAX_VALUE_DECIMALS: u8 = 9;

/// Upper bound on one replay batch; longer histories arrive as several
/// batches in order.
pub const MAX_REPLAY_BATCH: usize = 256;

/// Optional context accompanying a feedback. Passed through to the
/// emitted notification; never consulted by the scoring algorithm.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackContext {
    pub tag: Option<String>,
    pub value: Option<u64>,
    pub decimals: Option<u8>,
    #[serde(with = "crate::identity::hex32_opt", default)]
    pub uri_commitment: Option<[u8; 32]>,
}

impl FeedbackContext {
    fn validate(&self) -> Result<(), EngineError> {
        if let Some(decimals) = self.decimals {
            if decimals > MAX_VALUE_DECIMALS || self.value.is_none() {
                return Err(EngineError::InvalidDecimals);
            }
        }
        Ok(())
    }
}

/// Returned for every accepted feedback; doubles as the emitted
/// notification payload.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReceipt {
    pub receipt_id: String,
    pub agent: Identity,
    pub sequence: u64,
    pub outcome: UpdateOutcome,
    pub context: FeedbackContext,
    pub created_at: DateTime<Utc>,
}

/// Read-only trust summary for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub agent: Identity,
    pub trust_tier: TrustTier,
    pub quality_score: u16,
    pub risk_score: u8,
    pub confidence: u16,
    pub feedback_count: u64,
    /// Diversity estimator output; approximate by design.
    pub unique_clients: u64,
    pub diversity_ratio: u8,
    pub ema_score_fast: u16,
    pub ema_score_slow: u16,
    pub first_event_seq: u64,
    pub last_event_seq: u64,
}

/// Result of a completed replay batch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReplayOutcome {
    pub agent: Identity,
    pub events_replayed: usize,
    pub feedback_count: u64,
    pub trust_tier: TrustTier,
}

/// Serialized front door to the reputation engine.
pub struct EngineManager {
    directory: Arc<dyn AgentDirectory>,
    params: RwLock<EngineParams>,
    records: RwLock<HashMap<Identity, ReputationStats>>,
    checkpoints: RwLock<HashMap<Identity, Vec<Checkpoint>>>,
    /// Stand-in for the platform's serialized slot counter.
    sequence: AtomicU64,
}

impl EngineManager {
    pub fn new(directory: Arc<dyn AgentDirectory>, authority: Identity) -> Self {
        Self {
            directory,
            params: RwLock::new(EngineParams::new(authority)),
            records: RwLock::new(HashMap::new()),
            checkpoints: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Start from explicit parameters (service boot path).
    pub fn with_params(directory: Arc<dyn AgentDirectory>, params: EngineParams) -> Self {
        Self {
            directory,
            params: RwLock::new(params),
            records: RwLock::new(HashMap::new()),
            checkpoints: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Submit one feedback about an agent.
    ///
    /// Precondition order: pause gate, score and context validation,
    /// owner lookup, anti-gaming guard. Nothing is mutated until all of
    /// them pass.
    pub async fn submit_feedback(
        &self,
        client: Identity,
        agent: Identity,
        score: u8,
        context: FeedbackContext,
    ) -> Result<FeedbackReceipt, EngineError> {
        let params = *self.params.read().await;
        if params.paused {
            return Err(EngineError::Paused);
        }
        if score > SCORE_MAX {
            return Err(EngineError::InvalidScore);
        }
        context.validate()?;

        let owner = self
            .directory
            .owner_of(&agent)
            .ok_or(EngineError::UnknownAgent)?;
        guard::ensure_not_owner(&client, &owner)?;

        let mut records = self.records.write().await;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut staged = records
            .get(&agent)
            .copied()
            .unwrap_or_else(|| ReputationStats::new(agent));

        let event = FeedbackEvent {
            commitment: client_commitment(&client),
            score,
            sequence,
        };
        let outcome = staged.apply(&event, &params)?;
        records.insert(agent, staged);
        drop(records);

        info!(
            agent = %agent.short(),
            score,
            feedback_index = outcome.feedback_index,
            trust_tier = ?outcome.trust_tier,
            risk = outcome.risk_score,
            "feedback accepted"
        );

        Ok(FeedbackReceipt {
            receipt_id: Uuid::new_v4().to_string(),
            agent,
            sequence,
            outcome,
            context,
            created_at: Utc::now(),
        })
    }

    /// Read-only trust summary. None until the agent has feedback.
    pub async fn get_summary(&self, agent: &Identity) -> Option<Summary> {
        let records = self.records.read().await;
        records.get(agent).map(|stats| Summary {
            agent: stats.agent,
            trust_tier: stats.trust_tier,
            quality_score: stats.quality_score,
            risk_score: stats.risk_score,
            confidence: stats.confidence,
            feedback_count: stats.feedback_count,
            unique_clients: stats.hll.estimate(),
            diversity_ratio: stats.diversity_ratio,
            ema_score_fast: stats.ema_score_fast,
            ema_score_slow: stats.ema_score_slow,
            first_event_seq: stats.first_event_seq,
            last_event_seq: stats.last_event_seq,
        })
    }

    /// Full record snapshot, for checkpoint verification and tests.
    pub async fn stats_snapshot(&self, agent: &Identity) -> Option<ReputationStats> {
        self.records.read().await.get(agent).copied()
    }

    pub async fn params(&self) -> EngineParams {
        *self.params.read().await
    }

    /// Authority-only sparse parameter update.
    pub async fn update_params(
        &self,
        actor: Identity,
        patch: ParamsPatch,
    ) -> Result<EngineParams, EngineError> {
        let mut params = self.params.write().await;
        guard::ensure_authority(&actor, &params)?;
        let version = params.apply_patch(&patch)?;

        info!(version, paused = params.paused, "engine params updated");
        Ok(*params)
    }

    /// Anchor the agent's current state. Anyone may create checkpoints;
    /// sequencing rules are enforced by the core.
    pub async fn create_checkpoint(
        &self,
        agent: Identity,
        index: u64,
        expected_hash: Option<[u8; 32]>,
    ) -> Result<Checkpoint, EngineError> {
        let records = self.records.read().await;
        let stats = records
            .get(&agent)
            .ok_or(EngineError::StatsNotInitialized)?;

        let mut checkpoints = self.checkpoints.write().await;
        let list = checkpoints.entry(agent).or_default();
        let created = checkpoint::create_checkpoint(stats, list.last(), index, expected_hash)?;
        list.push(created);

        debug!(
            agent = %agent.short(),
            index,
            feedback_count = created.feedback_count,
            "checkpoint created"
        );
        Ok(created)
    }

    pub async fn checkpoints(&self, agent: &Identity) -> Vec<Checkpoint> {
        self.checkpoints
            .read()
            .await
            .get(agent)
            .cloned()
            .unwrap_or_default()
    }

    /// Authority-only reconstruction from a batch of historical events.
    ///
    /// Events flow through the same update path as live feedback, in
    /// array order. Per-event anti-gaming checks are deliberately skipped:
    /// the authority attests that the batch is a previously validated
    /// history. Replay also works while paused, which is the expected
    /// maintenance window for reconstruction. The batch is validated as a
    /// whole before any event lands.
    pub async fn replay_batch(
        &self,
        actor: Identity,
        agent: Identity,
        events: &[ReplayEvent],
    ) -> Result<ReplayOutcome, EngineError> {
        let params = *self.params.read().await;
        guard::ensure_authority(&actor, &params)?;

        if events.is_empty() || events.len() > MAX_REPLAY_BATCH {
            return Err(EngineError::InvalidReplayBatch);
        }
        if events.iter().any(|event| event.score > SCORE_MAX) {
            return Err(EngineError::InvalidReplayBatch);
        }

        let mut records = self.records.write().await;
        let mut staged = records
            .get(&agent)
            .copied()
            .unwrap_or_else(|| ReputationStats::new(agent));

        for event in events {
            staged.apply(
                &FeedbackEvent {
                    commitment: event.client_commitment,
                    score: event.score,
                    sequence: event.sequence_marker,
                },
                &params,
            )?;
        }

        let outcome = ReplayOutcome {
            agent,
            events_replayed: events.len(),
            feedback_count: staged.feedback_count,
            trust_tier: staged.trust_tier,
        };
        records.insert(agent, staged);
        drop(records);

        // Keep live sequencing ahead of the replayed history.
        if let Some(last) = events.last() {
            self.sequence.fetch_max(last.sequence_marker, Ordering::SeqCst);
        }

        info!(
            agent = %agent.short(),
            events = outcome.events_replayed,
            feedback_count = outcome.feedback_count,
            "replay batch applied"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryDirectory;

    fn setup() -> (Arc<InMemoryDirectory>, EngineManager, Identity, Identity) {
        let directory = Arc::new(InMemoryDirectory::new());
        let authority = Identity([0xAA; 32]);
        let manager = EngineManager::new(directory.clone(), authority);

        let agent = Identity([0x11; 32]);
        let owner = Identity([0x22; 32]);
        directory.register(agent, owner);

        (directory, manager, agent, owner)
    }

    #[tokio::test]
    async fn test_owner_cannot_rate_own_agent() {
        let (_, manager, agent, owner) = setup();

        let result = manager
            .submit_feedback(owner, agent, 100, FeedbackContext::default())
            .await;
        assert_eq!(result.unwrap_err(), EngineError::SelfFeedbackNotAllowed);
        assert!(manager.get_summary(&agent).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let (_, manager, _, _) = setup();

        let result = manager
            .submit_feedback(
                Identity([1; 32]),
                Identity([0xEE; 32]),
                80,
                FeedbackContext::default(),
            )
            .await;
        assert_eq!(result.unwrap_err(), EngineError::UnknownAgent);
    }

    #[tokio::test]
    async fn test_decimals_require_value() {
        let (_, manager, agent, _) = setup();

        let context = FeedbackContext {
            decimals: Some(6),
            ..FeedbackContext::default()
        };
        let result = manager
            .submit_feedback(Identity([1; 32]), agent, 80, context)
            .await;
        assert_eq!(result.unwrap_err(), EngineError::InvalidDecimals);

        let context = FeedbackContext {
            value: Some(1_000_000),
            decimals: Some(10),
            ..FeedbackContext::default()
        };
        let result = manager
            .submit_feedback(Identity([1; 32]), agent, 80, context)
            .await;
        assert_eq!(result.unwrap_err(), EngineError::InvalidDecimals);
    }

    #[tokio::test]
    async fn test_replay_requires_authority() {
        let (_, manager, agent, _) = setup();

        let events = [ReplayEvent {
            client_commitment: [1; 32],
            score: 80,
            sequence_marker: 1,
        }];
        let result = manager
            .replay_batch(Identity([0xBB; 32]), agent, &events)
            .await;
        assert_eq!(result.unwrap_err(), EngineError::NotAuthority);
    }

    #[tokio::test]
    async fn test_empty_replay_batch_rejected() {
        let (_, manager, agent, _) = setup();

        let result = manager
            .replay_batch(Identity([0xAA; 32]), agent, &[])
            .await;
        assert_eq!(result.unwrap_err(), EngineError::InvalidReplayBatch);
    }

    #[tokio::test]
    async fn test_replay_works_while_paused() {
        let (_, manager, agent, _) = setup();
        let authority = Identity([0xAA; 32]);

        manager
            .update_params(authority, ParamsPatch::pause(true))
            .await
            .unwrap();

        let events = [ReplayEvent {
            client_commitment: [1; 32],
            score: 80,
            sequence_marker: 1,
        }];
        let outcome = manager.replay_batch(authority, agent, &events).await.unwrap();
        assert_eq!(outcome.feedback_count, 1);
    }
}
