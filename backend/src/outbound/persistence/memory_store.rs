//! In-memory document store adapter.
//!
//! Implements [`ProgressionStore`] over a single mutex-guarded map of JSON
//! documents with per-document version counters. Commits are
//! all-or-nothing: every version precondition in a batch is checked against
//! the same locked snapshot before any write lands, which gives the same
//! optimistic-concurrency semantics as the hosted document store the
//! production deployment targets.
//!
//! Documents cross this boundary as sanitised JSON, so the adapter enforces
//! the no-undefined rule even though the backing map could store anything.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::challenge::{Challenge, ChallengeDraft};
use crate::domain::ids::{ChallengeId, UserId};
use crate::domain::ledger::{CompletionRecord, UserXp, XpTransaction};
use crate::domain::ports::{
    CommitError, DocumentVersion, DocumentWrite, ProgressionStore, StoreError, Versioned,
    VersionedWrite, WriteBatch,
};
use crate::domain::streak::UserStreak;
use crate::domain::user_challenge::UserChallenge;
use crate::outbound::persistence::schema::{
    self, CHALLENGES, COMPLETION_RECORDS, CollectionSchema, USER_CHALLENGES, USER_STREAKS,
    USER_XP, XP_TRANSACTIONS,
};

#[derive(Debug, Clone)]
struct VersionedDoc {
    value: Value,
    version: DocumentVersion,
}

#[derive(Debug, Default)]
struct State {
    challenges: HashMap<String, VersionedDoc>,
    user_challenges: HashMap<String, VersionedDoc>,
    user_xp: HashMap<String, VersionedDoc>,
    user_streaks: HashMap<String, VersionedDoc>,
    completion_records: HashMap<String, Value>,
    xp_transactions: Vec<Value>,
}

/// The versioned collections, keyed explicitly so a write can never land in
/// the wrong map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VersionedCollection {
    Challenges,
    UserChallenges,
    UserXp,
    UserStreaks,
}

impl VersionedCollection {
    fn name(self) -> &'static str {
        match self {
            Self::Challenges => CHALLENGES.name,
            Self::UserChallenges => USER_CHALLENGES.name,
            Self::UserXp => USER_XP.name,
            Self::UserStreaks => USER_STREAKS.name,
        }
    }
}

impl State {
    fn versioned_collection(
        &mut self,
        collection: VersionedCollection,
    ) -> &mut HashMap<String, VersionedDoc> {
        match collection {
            VersionedCollection::Challenges => &mut self.challenges,
            VersionedCollection::UserChallenges => &mut self.user_challenges,
            VersionedCollection::UserXp => &mut self.user_xp,
            VersionedCollection::UserStreaks => &mut self.user_streaks,
        }
    }
}

/// Mutex-guarded in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn attempt_key(user_id: &UserId, challenge_id: &ChallengeId) -> String {
    format!("{user_id}:{challenge_id}")
}

fn encode<T: Serialize>(collection: &CollectionSchema, value: &T) -> Result<Value, CommitError> {
    let mut doc =
        serde_json::to_value(value).map_err(|err| CommitError::backend(err.to_string()))?;
    schema::sanitize(collection, &mut doc)
        .map_err(|err| CommitError::sanitization(err.to_string()))?;
    Ok(doc)
}

fn decode<T: serde::de::DeserializeOwned>(doc: &VersionedDoc) -> Result<Versioned<T>, StoreError> {
    let value = serde_json::from_value(doc.value.clone())
        .map_err(|err| StoreError::decode(err.to_string()))?;
    Ok(Versioned::new(value, doc.version))
}

/// One sanitised, keyed write ready to apply.
enum PlannedWrite {
    Versioned {
        collection: VersionedCollection,
        key: String,
        expected: DocumentVersion,
        doc: Value,
    },
    RecordInsert {
        key: String,
        doc: Value,
    },
    TransactionAppend {
        doc: Value,
    },
}

fn plan(batch: &WriteBatch) -> Result<Vec<PlannedWrite>, CommitError> {
    batch
        .writes()
        .iter()
        .map(|write| match write {
            DocumentWrite::Challenge(VersionedWrite { expected, value }) => {
                Ok(PlannedWrite::Versioned {
                    collection: VersionedCollection::Challenges,
                    key: value.id().to_string(),
                    expected: *expected,
                    doc: encode(&CHALLENGES, value.as_draft())?,
                })
            }
            DocumentWrite::UserChallenge(VersionedWrite { expected, value }) => {
                Ok(PlannedWrite::Versioned {
                    collection: VersionedCollection::UserChallenges,
                    key: attempt_key(&value.user_id, &value.challenge_id),
                    expected: *expected,
                    doc: encode(&USER_CHALLENGES, value)?,
                })
            }
            DocumentWrite::UserXp(VersionedWrite { expected, value }) => {
                Ok(PlannedWrite::Versioned {
                    collection: VersionedCollection::UserXp,
                    key: value.user_id.to_string(),
                    expected: *expected,
                    doc: encode(&USER_XP, value)?,
                })
            }
            DocumentWrite::UserStreak { user_id, write } => Ok(PlannedWrite::Versioned {
                collection: VersionedCollection::UserStreaks,
                key: user_id.to_string(),
                expected: write.expected,
                doc: encode(&USER_STREAKS, &write.value)?,
            }),
            DocumentWrite::CompletionRecord(record) => Ok(PlannedWrite::RecordInsert {
                key: attempt_key(&record.user_id, &record.challenge_id),
                doc: encode(&COMPLETION_RECORDS, record)?,
            }),
            DocumentWrite::XpTransaction(entry) => Ok(PlannedWrite::TransactionAppend {
                doc: encode(&XP_TRANSACTIONS, entry)?,
            }),
        })
        .collect()
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::connection("store mutex poisoned"))
    }

    fn lock_for_commit(&self) -> Result<MutexGuard<'_, State>, CommitError> {
        self.state
            .lock()
            .map_err(|_| CommitError::backend("store mutex poisoned"))
    }

    /// Every appended ledger entry, oldest first. Test observability.
    pub fn xp_transactions(&self) -> Result<Vec<XpTransaction>, StoreError> {
        let state = self.lock()?;
        state
            .xp_transactions
            .iter()
            .map(|doc| {
                serde_json::from_value(doc.clone())
                    .map_err(|err| StoreError::decode(err.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl ProgressionStore for MemoryStore {
    async fn load_challenge(
        &self,
        id: &ChallengeId,
    ) -> Result<Option<Versioned<Challenge>>, StoreError> {
        let state = self.lock()?;
        state
            .challenges
            .get(id.as_ref())
            .map(|doc| {
                let draft: Versioned<ChallengeDraft> = decode(doc)?;
                let challenge = Challenge::new(draft.value)
                    .map_err(|err| StoreError::decode(err.to_string()))?;
                Ok(Versioned::new(challenge, draft.version))
            })
            .transpose()
    }

    async fn load_user_challenge(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<Option<Versioned<UserChallenge>>, StoreError> {
        let state = self.lock()?;
        state
            .user_challenges
            .get(&attempt_key(user_id, challenge_id))
            .map(decode)
            .transpose()
    }

    async fn load_user_xp(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<UserXp>>, StoreError> {
        let state = self.lock()?;
        state.user_xp.get(user_id.as_ref()).map(decode).transpose()
    }

    async fn load_user_streak(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Versioned<UserStreak>>, StoreError> {
        let state = self.lock()?;
        state
            .user_streaks
            .get(user_id.as_ref())
            .map(decode)
            .transpose()
    }

    async fn find_completion_record(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<Option<CompletionRecord>, StoreError> {
        let state = self.lock()?;
        state
            .completion_records
            .get(&attempt_key(user_id, challenge_id))
            .map(|doc| {
                serde_json::from_value(doc.clone())
                    .map_err(|err| StoreError::decode(err.to_string()))
            })
            .transpose()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), CommitError> {
        let planned = plan(&batch)?;
        let mut state = self.lock_for_commit()?;

        // Check every precondition before applying anything.
        for write in &planned {
            match write {
                PlannedWrite::Versioned {
                    collection,
                    key,
                    expected,
                    ..
                } => {
                    let current = state
                        .versioned_collection(*collection)
                        .get(key)
                        .map_or(DocumentVersion::NEW, |doc| doc.version);
                    if current != *expected {
                        return Err(CommitError::conflict(collection.name(), key.clone()));
                    }
                }
                PlannedWrite::RecordInsert { key, .. } => {
                    if state.completion_records.contains_key(key) {
                        return Err(CommitError::immutable_overwrite(
                            COMPLETION_RECORDS.name,
                            key.clone(),
                        ));
                    }
                }
                PlannedWrite::TransactionAppend { .. } => {}
            }
        }

        for write in planned {
            match write {
                PlannedWrite::Versioned {
                    collection,
                    key,
                    expected,
                    doc,
                } => {
                    state.versioned_collection(collection).insert(
                        key,
                        VersionedDoc {
                            value: doc,
                            version: expected.next(),
                        },
                    );
                }
                PlannedWrite::RecordInsert { key, doc } => {
                    state.completion_records.insert(key, doc);
                }
                PlannedWrite::TransactionAppend { doc } => {
                    state.xp_transactions.push(doc);
                }
            }
        }
        Ok(())
    }

    async fn insert_challenge(&self, challenge: Challenge) -> Result<(), CommitError> {
        self.commit(WriteBatch::new().challenge(VersionedWrite::create(challenge)))
            .await
    }
}
