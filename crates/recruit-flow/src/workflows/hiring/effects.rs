//! Side-effect intents returned by the engine and the runner that executes them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::collaborators::{ConversationService, NotificationSender};
use super::domain::{ActorRole, ApplicationId, CandidateId, ConversationId, EntityKey, UserId};

/// Message addressed to the candidate behind an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateNotice {
    pub template: String,
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// Message addressed to whoever holds a staff role for the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorNotice {
    pub role: ActorRole,
    pub template: String,
    pub entity: EntityKey,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub staff_user_id: UserId,
}

/// External action requested by a pure workflow step, executed by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    NotifyCandidate(CandidateNotice),
    NotifyActor(ActorNotice),
    CreateOrReuseConversation(ConversationRequest),
}

impl SideEffect {
    pub fn template(&self) -> Option<&str> {
        match self {
            Self::NotifyCandidate(notice) => Some(&notice.template),
            Self::NotifyActor(notice) => Some(&notice.template),
            Self::CreateOrReuseConversation(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotifyCandidate(_) => "notify_candidate",
            Self::NotifyActor(_) => "notify_actor",
            Self::CreateOrReuseConversation(_) => "create_or_reuse_conversation",
        }
    }
}

/// What the notification sender receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    Candidate(CandidateNotice),
    Actor(ActorNotice),
}

impl Notification {
    pub fn template(&self) -> &str {
        match self {
            Self::Candidate(notice) => &notice.template,
            Self::Actor(notice) => &notice.template,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectFailure {
    pub effect: SideEffect,
    pub error: String,
}

/// Outcome of executing one batch of intents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectReport {
    pub delivered: usize,
    pub failures: Vec<EffectFailure>,
    /// Thread returned by the conversation service, if one was requested.
    pub conversation_id: Option<ConversationId>,
}

impl EffectReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Thin boundary that executes intents in order through the collaborators.
///
/// Delivery is not retried here; a failed intent is logged, reported, and the
/// remaining intents still run.
pub struct EffectRunner<N, C> {
    notifier: Arc<N>,
    conversations: Arc<C>,
}

impl<N, C> EffectRunner<N, C>
where
    N: NotificationSender + 'static,
    C: ConversationService + 'static,
{
    pub fn new(notifier: Arc<N>, conversations: Arc<C>) -> Self {
        Self {
            notifier,
            conversations,
        }
    }

    pub fn run(&self, effects: &[SideEffect]) -> EffectReport {
        let mut report = EffectReport::default();

        for effect in effects {
            let result = match effect {
                SideEffect::NotifyCandidate(notice) => self
                    .notifier
                    .send(&Notification::Candidate(notice.clone()))
                    .map_err(|err| err.to_string()),
                SideEffect::NotifyActor(notice) => self
                    .notifier
                    .send(&Notification::Actor(notice.clone()))
                    .map_err(|err| err.to_string()),
                SideEffect::CreateOrReuseConversation(request) => self
                    .conversations
                    .create_or_reuse(
                        &request.application_id,
                        &request.candidate_id,
                        &request.staff_user_id,
                    )
                    .map(|conversation_id| {
                        report.conversation_id = Some(conversation_id);
                    })
                    .map_err(|err| err.to_string()),
            };

            match result {
                Ok(()) => {
                    debug!(effect = effect.kind(), template = ?effect.template(), "side effect delivered");
                    report.delivered += 1;
                }
                Err(error) => {
                    warn!(effect = effect.kind(), template = ?effect.template(), %error, "side effect failed");
                    report.failures.push(EffectFailure {
                        effect: effect.clone(),
                        error,
                    });
                }
            }
        }

        report
    }
}
