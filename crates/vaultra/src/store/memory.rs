use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use super::RepositoryError;
use crate::agent::{Conversation, ConversationMessage, ConversationRepository};
use crate::ids::{BusinessId, ConversationId, IntegrationId, RecommendationId, UserId};
use crate::integrations::{
    IntegrationAccount, IntegrationRepository, IntegrationStatus, LedgerPayout, LedgerRepository,
    LedgerTransaction, Provider, ProviderEvent,
};
use crate::metrics::{MetricSnapshot, MetricsRepository, ReadinessScore};
use crate::recommendations::{
    Recommendation, RecommendationFilter, RecommendationRepository, RecommendationStatus,
};
use crate::users::{Business, BusinessRepository, Membership, MembershipRole, User, UserRepository};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    businesses: HashMap<BusinessId, Business>,
    memberships: Vec<Membership>,
    snapshots: Vec<MetricSnapshot>,
    scores: Vec<ReadinessScore>,
    recommendations: Vec<Recommendation>,
    integrations: Vec<IntegrationAccount>,
    events: HashMap<(Provider, String), ProviderEvent>,
    transactions: HashMap<BusinessId, Vec<LedgerTransaction>>,
    payouts: HashMap<BusinessId, Vec<LedgerPayout>>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: Vec<ConversationMessage>,
}

/// Process-local store behind every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Every webhook event recorded so far, oldest first.
    pub fn provider_events(&self) -> Result<Vec<ProviderEvent>, RepositoryError> {
        let state = self.state()?;
        let mut events: Vec<ProviderEvent> = state.events.values().cloned().collect();
        events.sort_by_key(|event| event.received_at);
        Ok(events)
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserRepository for MemoryStore {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut state = self.state()?;
        let key = email_key(&user.email);
        if state.emails.contains_key(&key) || state.users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict("user"));
        }
        state.emails.insert(key, user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state()?.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .emails
            .get(&email_key(email))
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    fn update_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut state = self.state()?;
        let previous = state
            .users
            .get(&user.id)
            .map(|existing| email_key(&existing.email))
            .ok_or(RepositoryError::NotFound("user"))?;

        let key = email_key(&user.email);
        if key != previous {
            if state.emails.contains_key(&key) {
                return Err(RepositoryError::Conflict("user"));
            }
            state.emails.remove(&previous);
            state.emails.insert(key, user.id);
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

impl BusinessRepository for MemoryStore {
    fn insert_business(
        &self,
        business: Business,
        owner: Membership,
    ) -> Result<Business, RepositoryError> {
        let mut state = self.state()?;
        if state.businesses.contains_key(&business.id) {
            return Err(RepositoryError::Conflict("business"));
        }
        state.businesses.insert(business.id, business.clone());
        state.memberships.push(Membership {
            business_id: business.id,
            ..owner
        });
        Ok(business)
    }

    fn find_business(&self, id: BusinessId) -> Result<Option<Business>, RepositoryError> {
        Ok(self.state()?.businesses.get(&id).cloned())
    }

    fn update_business(&self, business: Business) -> Result<Business, RepositoryError> {
        let mut state = self.state()?;
        let slot = state
            .businesses
            .get_mut(&business.id)
            .ok_or(RepositoryError::NotFound("business"))?;
        *slot = business.clone();
        Ok(business)
    }

    fn membership(
        &self,
        user_id: UserId,
        business_id: BusinessId,
    ) -> Result<Option<Membership>, RepositoryError> {
        Ok(self
            .state()?
            .memberships
            .iter()
            .find(|membership| {
                membership.user_id == user_id && membership.business_id == business_id
            })
            .cloned())
    }

    fn businesses_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(Business, MembershipRole)>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .memberships
            .iter()
            .filter(|membership| membership.user_id == user_id)
            .filter_map(|membership| {
                state
                    .businesses
                    .get(&membership.business_id)
                    .map(|business| (business.clone(), membership.role))
            })
            .collect())
    }
}

impl MetricsRepository for MemoryStore {
    fn insert_snapshot(&self, snapshot: MetricSnapshot) -> Result<MetricSnapshot, RepositoryError> {
        let mut state = self.state()?;
        let duplicate = state.snapshots.iter().any(|existing| {
            existing.business_id == snapshot.business_id
                && existing.period_start == snapshot.period_start
                && existing.period_end == snapshot.period_end
        });
        if duplicate {
            return Err(RepositoryError::Conflict("metric snapshot"));
        }
        state.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    fn find_snapshot_for_period(
        &self,
        business_id: BusinessId,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Option<MetricSnapshot>, RepositoryError> {
        Ok(self
            .state()?
            .snapshots
            .iter()
            .find(|snapshot| {
                snapshot.business_id == business_id
                    && snapshot.period_start == period_start
                    && snapshot.period_end == period_end
            })
            .cloned())
    }

    fn latest_snapshot(
        &self,
        business_id: BusinessId,
    ) -> Result<Option<MetricSnapshot>, RepositoryError> {
        Ok(self
            .state()?
            .snapshots
            .iter()
            .filter(|snapshot| snapshot.business_id == business_id)
            .max_by_key(|snapshot| (snapshot.period_end, snapshot.created_at))
            .cloned())
    }

    fn snapshot_history(
        &self,
        business_id: BusinessId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<MetricSnapshot>, RepositoryError> {
        let state = self.state()?;
        let mut history: Vec<MetricSnapshot> = state
            .snapshots
            .iter()
            .filter(|snapshot| snapshot.business_id == business_id)
            .filter(|snapshot| start.map_or(true, |start| snapshot.period_end >= start))
            .filter(|snapshot| end.map_or(true, |end| snapshot.period_end <= end))
            .cloned()
            .collect();
        history.sort_by_key(|snapshot| Reverse((snapshot.period_end, snapshot.created_at)));
        Ok(history)
    }

    fn insert_score(&self, score: ReadinessScore) -> Result<ReadinessScore, RepositoryError> {
        self.state()?.scores.push(score.clone());
        Ok(score)
    }

    fn latest_score(
        &self,
        business_id: BusinessId,
    ) -> Result<Option<ReadinessScore>, RepositoryError> {
        Ok(self.score_history(business_id, 1)?.into_iter().next())
    }

    fn score_history(
        &self,
        business_id: BusinessId,
        limit: usize,
    ) -> Result<Vec<ReadinessScore>, RepositoryError> {
        let state = self.state()?;
        let mut history: Vec<ReadinessScore> = state
            .scores
            .iter()
            .rev()
            .filter(|score| score.business_id == business_id)
            .cloned()
            .collect();
        history.sort_by_key(|score| Reverse(score.created_at));
        history.truncate(limit);
        Ok(history)
    }
}

impl RecommendationRepository for MemoryStore {
    fn insert_many(
        &self,
        recommendations: Vec<Recommendation>,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        let mut state = self.state()?;
        if recommendations.iter().any(|candidate| {
            state
                .recommendations
                .iter()
                .any(|existing| existing.id == candidate.id)
        }) {
            return Err(RepositoryError::Conflict("recommendation"));
        }
        state.recommendations.extend(recommendations.iter().cloned());
        Ok(recommendations)
    }

    fn find(&self, id: RecommendationId) -> Result<Option<Recommendation>, RepositoryError> {
        Ok(self
            .state()?
            .recommendations
            .iter()
            .find(|recommendation| recommendation.id == id)
            .cloned())
    }

    fn update_status(
        &self,
        id: RecommendationId,
        status: RecommendationStatus,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, RepositoryError> {
        let mut state = self.state()?;
        let recommendation = state
            .recommendations
            .iter_mut()
            .find(|recommendation| recommendation.id == id)
            .ok_or(RepositoryError::NotFound("recommendation"))?;
        recommendation.status = status;
        recommendation.updated_at = now;
        Ok(recommendation.clone())
    }

    fn list(
        &self,
        business_id: BusinessId,
        filter: RecommendationFilter,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        Ok(self
            .state()?
            .recommendations
            .iter()
            .filter(|recommendation| recommendation.business_id == business_id)
            .filter(|recommendation| filter.matches(recommendation))
            .cloned()
            .collect())
    }
}

impl IntegrationRepository for MemoryStore {
    fn upsert_integration(
        &self,
        account: IntegrationAccount,
    ) -> Result<IntegrationAccount, RepositoryError> {
        let mut state = self.state()?;
        let position = state.integrations.iter().position(|existing| {
            existing.business_id == account.business_id && existing.provider == account.provider
        });
        let stored = match position {
            Some(index) => {
                let existing = &state.integrations[index];
                IntegrationAccount {
                    id: existing.id,
                    created_at: existing.created_at,
                    ..account
                }
            }
            None => account,
        };
        match position {
            Some(index) => state.integrations[index] = stored.clone(),
            None => state.integrations.push(stored.clone()),
        }
        Ok(stored)
    }

    fn find_integration(
        &self,
        business_id: BusinessId,
        provider: Provider,
    ) -> Result<Option<IntegrationAccount>, RepositoryError> {
        Ok(self
            .state()?
            .integrations
            .iter()
            .find(|account| account.business_id == business_id && account.provider == provider)
            .cloned())
    }

    fn active_integrations(
        &self,
        provider: Provider,
    ) -> Result<Vec<IntegrationAccount>, RepositoryError> {
        Ok(self
            .state()?
            .integrations
            .iter()
            .filter(|account| account.provider == provider && account.is_active())
            .cloned()
            .collect())
    }

    fn mark_synced(
        &self,
        id: IntegrationId,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<IntegrationAccount>, RepositoryError> {
        let mut state = self.state()?;
        let Some(slot) = state.integrations.iter_mut().find(|existing| {
            existing.id == id && existing.external_id == external_id && existing.is_active()
        }) else {
            return Ok(None);
        };
        slot.last_synced_at = Some(at);
        slot.updated_at = at;
        Ok(Some(slot.clone()))
    }

    fn revoke_integration(
        &self,
        provider: Provider,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<IntegrationAccount>, RepositoryError> {
        let mut state = self.state()?;
        Ok(state
            .integrations
            .iter_mut()
            .filter(|account| {
                account.provider == provider
                    && account.external_id == external_id
                    && account.status != IntegrationStatus::Revoked
            })
            .map(|account| {
                account.status = IntegrationStatus::Revoked;
                account.updated_at = at;
                account.clone()
            })
            .collect())
    }

    fn record_event(&self, event: ProviderEvent) -> Result<bool, RepositoryError> {
        let mut state = self.state()?;
        let key = (event.provider, event.provider_event_id.clone());
        if state.events.contains_key(&key) {
            return Ok(false);
        }
        state.events.insert(key, event);
        Ok(true)
    }
}

impl LedgerRepository for MemoryStore {
    fn upsert_transactions(
        &self,
        business_id: BusinessId,
        transactions: Vec<LedgerTransaction>,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.state()?;
        let ledger = state.transactions.entry(business_id).or_default();
        let count = transactions.len();
        for transaction in transactions {
            match ledger
                .iter()
                .position(|existing| existing.external_id == transaction.external_id)
            {
                Some(index) => ledger[index] = transaction,
                None => ledger.push(transaction),
            }
        }
        Ok(count)
    }

    fn upsert_payouts(
        &self,
        business_id: BusinessId,
        payouts: Vec<LedgerPayout>,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.state()?;
        let ledger = state.payouts.entry(business_id).or_default();
        let count = payouts.len();
        for payout in payouts {
            match ledger
                .iter()
                .position(|existing| existing.external_id == payout.external_id)
            {
                Some(index) => ledger[index] = payout,
                None => ledger.push(payout),
            }
        }
        Ok(count)
    }

    fn transactions_between(
        &self,
        business_id: BusinessId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LedgerTransaction>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .transactions
            .get(&business_id)
            .map(|ledger| {
                ledger
                    .iter()
                    .filter(|transaction| {
                        let day = transaction.created_at.date_naive();
                        day >= start && day <= end
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn payouts_due_between(
        &self,
        business_id: BusinessId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LedgerPayout>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .payouts
            .get(&business_id)
            .map(|ledger| {
                ledger
                    .iter()
                    .filter(|payout| {
                        payout.expected_arrival >= start && payout.expected_arrival <= end
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl ConversationRepository for MemoryStore {
    fn insert_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<Conversation, RepositoryError> {
        let mut state = self.state()?;
        if state.conversations.contains_key(&conversation.id) {
            return Err(RepositoryError::Conflict("conversation"));
        }
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state()?.conversations.get(&id).cloned())
    }

    fn append_messages(&self, messages: Vec<ConversationMessage>) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if messages
            .iter()
            .any(|message| !state.conversations.contains_key(&message.conversation_id))
        {
            return Err(RepositoryError::NotFound("conversation"));
        }
        state.messages.extend(messages);
        Ok(())
    }

    fn messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let state = self.state()?;
        let mut thread: Vec<ConversationMessage> = state
            .messages
            .iter()
            .filter(|message| message.conversation_id == conversation_id)
            .cloned()
            .collect();
        thread.sort_by_key(|message| message.created_at);
        Ok(thread)
    }
}
