//! Companion conversation driver.

use tracing::{debug, warn};

use wellspring_safety::{assess, Escalation, EscalationDispatcher, Surface};

use crate::provider::ReplyProvider;
use crate::transcript::{Role, Transcript};
use crate::{CompanionError, CompanionResult};

/// One completed user message and companion reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionExchange {
    pub reply: String,
    /// Escalation raised by the user's message.
    pub user_escalation: Option<Escalation>,
    /// Escalation raised by the companion's reply.
    pub reply_escalation: Option<Escalation>,
}

impl CompanionExchange {
    pub fn escalated(&self) -> bool {
        self.user_escalation.is_some() || self.reply_escalation.is_some()
    }
}

pub struct CompanionChat<P: ReplyProvider> {
    provider: P,
    escalation: EscalationDispatcher,
    transcript: Transcript,
    history_limit: usize,
}

impl<P: ReplyProvider> CompanionChat<P> {
    pub fn new(provider: P, escalation: EscalationDispatcher, history_limit: usize) -> Self {
        Self {
            provider,
            escalation,
            transcript: Transcript::new(),
            history_limit,
        }
    }

    /// Send a user message and wait for the reply.
    ///
    /// The user's message is scanned and recorded before the provider is
    /// called, so a failed reply still leaves it in the transcript and any
    /// escalation it raised stays active.
    pub async fn send(&mut self, text: &str) -> CompanionResult<CompanionExchange> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CompanionError::EmptyMessage);
        }

        let user_signal = assess(text);
        let user_escalation = self.escalation.dispatch(Surface::Companion, &user_signal);
        self.transcript.push(Role::User, text, user_signal.severity);

        let history = self.transcript.recent(self.history_limit);
        let reply = match self.provider.reply(history).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(provider = self.provider.name(), %error, "companion reply failed");
                return Err(error);
            }
        };

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(CompanionError::EmptyReply);
        }

        let reply_signal = assess(&reply);
        let reply_escalation = self
            .escalation
            .dispatch(Surface::CompanionReply, &reply_signal);
        self.transcript
            .push(Role::Companion, reply.clone(), reply_signal.severity);
        debug!(turns = self.transcript.len(), "companion exchange complete");

        Ok(CompanionExchange {
            reply,
            user_escalation,
            reply_escalation,
        })
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn escalation(&self) -> &EscalationDispatcher {
        &self.escalation
    }
}
