//! # Challenge Sessions
//!
//! A [`ChallengeSession`] is the short-lived state between a ceremony's Start
//! and its Finish: which user the attempt is for, the challenge that was
//! issued, the verifier's opaque state, and when it stops being valid.
//!
//! It lives in the client's server-side session (see [`ChallengeSlot`]), one
//! slot per session. A new Start overwrites the slot, which implicitly
//! invalidates any challenge still outstanding there. Finish always removes
//! the slot before doing anything else, so a challenge can be redeemed at
//! most once whatever the outcome.
//!
//! ## Lifecycle
//! ```text
//! Idle --Start--> AwaitingResponse --Finish--> Verified | Failed --> Idle
//! ```

use crate::error::{AppError, AppResult};
use crate::webauthn::verifier::PendingCeremony;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower_sessions::{Expiry, Session};

/// How long an issued challenge may be answered
pub const CHALLENGE_TIMEOUT_SECS: i64 = 60;

/// Session key holding the outstanding ceremony
const CEREMONY_KEY: &str = "ceremony";

/// Session key holding the id of the user who completed a login
pub const USER_ID_KEY: &str = "user_id";

/// Session key holding the session's absolute deadline (unix seconds)
const DEADLINE_KEY: &str = "expires_at";

/// Absolute lifetime of a session cookie, counted from creation or login
pub const SESSION_LIFETIME_HOURS: i64 = 24;

/// Pin the session's expiry to the deadline stored in it, starting one on
/// first use. Call before any write so the store never slides the deadline.
pub async fn keep_deadline(session: &Session) -> AppResult<()> {
    let deadline = match session.get::<i64>(DEADLINE_KEY).await? {
        Some(ts) => OffsetDateTime::from_unix_timestamp(ts)
            .map_err(|e| AppError::Internal(format!("Bad session deadline: {}", e)))?,
        None => return renew_deadline(session).await,
    };
    session.set_expiry(Some(Expiry::AtDateTime(deadline)));
    Ok(())
}

/// Start a fresh lifetime from now
pub async fn renew_deadline(session: &Session) -> AppResult<()> {
    let deadline =
        OffsetDateTime::now_utc() + time::Duration::hours(SESSION_LIFETIME_HOURS);
    session.insert(DEADLINE_KEY, deadline.unix_timestamp()).await?;
    session.set_expiry(Some(Expiry::AtDateTime(deadline)));
    Ok(())
}

/// Which of the two ceremonies a challenge was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

/// Outstanding challenge bound to one client session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSession {
    pub kind: CeremonyKind,

    /// User provisionally identified at Start
    pub subject_user_id: String,

    /// Base64url challenge as sent to the client
    pub challenge: String,

    /// Verifier state needed to check the response (opaque to the engine)
    pub verifier_state: serde_json::Value,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeSession {
    /// Bind a freshly issued challenge to `subject_user_id`
    pub fn issue(kind: CeremonyKind, subject_user_id: &str, pending: PendingCeremony) -> Self {
        Self::issue_at(kind, subject_user_id, pending, Utc::now())
    }

    pub fn issue_at(
        kind: CeremonyKind,
        subject_user_id: &str,
        pending: PendingCeremony,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            subject_user_id: subject_user_id.to_string(),
            challenge: pending.challenge,
            verifier_state: pending.state,
            issued_at: now,
            expires_at: now + Duration::seconds(CHALLENGE_TIMEOUT_SECS),
        }
    }

    /// Check a slot's contents at Finish time
    ///
    /// - nothing bound, or a different ceremony bound: `MissingSession`
    /// - bound but past its expiry: `SessionExpired`
    pub fn redeem(
        slot: Option<ChallengeSession>,
        expected: CeremonyKind,
        now: DateTime<Utc>,
    ) -> AppResult<ChallengeSession> {
        let session = match slot {
            Some(session) if session.kind == expected => session,
            Some(other) => {
                tracing::debug!(
                    "Session holds a {:?} ceremony, expected {:?}",
                    other.kind,
                    expected
                );
                return Err(AppError::MissingSession);
            }
            None => return Err(AppError::MissingSession),
        };

        if now > session.expires_at {
            tracing::debug!(
                "Challenge for user {} expired at {}",
                session.subject_user_id,
                session.expires_at
            );
            return Err(AppError::SessionExpired);
        }

        Ok(session)
    }

    /// The verifier's view of this session
    pub fn pending(&self) -> PendingCeremony {
        PendingCeremony {
            challenge: self.challenge.clone(),
            state: self.verifier_state.clone(),
        }
    }
}

/// The one ceremony slot of a client's session
///
/// Wraps the `tower_sessions::Session` the transport layer resolved from the
/// signed cookie.
pub struct ChallengeSlot<'a> {
    session: &'a Session,
}

impl<'a> ChallengeSlot<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Store `challenge`, replacing whatever ceremony was outstanding
    pub async fn bind(&self, challenge: &ChallengeSession) -> AppResult<()> {
        keep_deadline(self.session).await?;
        self.session.insert(CEREMONY_KEY, challenge).await?;
        Ok(())
    }

    /// Remove and return the outstanding ceremony, if any
    ///
    /// The removal is written to the store before returning. The session
    /// layer skips its own save when the response is a server error, and the
    /// challenge must be gone whatever the Finish call ends up returning.
    pub async fn take(&self) -> AppResult<Option<ChallengeSession>> {
        let taken = self.session.remove::<ChallengeSession>(CEREMONY_KEY).await?;
        if taken.is_some() {
            keep_deadline(self.session).await?;
            self.session.save().await?;
        }
        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn pending(challenge: &str) -> PendingCeremony {
        PendingCeremony {
            challenge: challenge.to_string(),
            state: json!({ "challenge": challenge }),
        }
    }

    #[test]
    fn test_redeem_live_session() {
        let now = Utc::now();
        let issued = ChallengeSession::issue_at(CeremonyKind::Registration, "u1", pending("c1"), now);

        let redeemed = ChallengeSession::redeem(
            Some(issued),
            CeremonyKind::Registration,
            now + Duration::seconds(59),
        )
        .unwrap();
        assert_eq!(redeemed.subject_user_id, "u1");
        assert_eq!(redeemed.pending().challenge, "c1");
    }

    #[test]
    fn test_redeem_empty_slot_is_missing() {
        let err = ChallengeSession::redeem(None, CeremonyKind::Authentication, Utc::now());
        assert!(matches!(err, Err(AppError::MissingSession)));
    }

    #[test]
    fn test_redeem_other_ceremony_is_missing() {
        let now = Utc::now();
        let issued =
            ChallengeSession::issue_at(CeremonyKind::Authentication, "u1", pending("c1"), now);
        let err = ChallengeSession::redeem(Some(issued), CeremonyKind::Registration, now);
        assert!(matches!(err, Err(AppError::MissingSession)));
    }

    #[test]
    fn test_redeem_expired_is_distinct_from_missing() {
        let issued_at = Utc::now() - Duration::seconds(CHALLENGE_TIMEOUT_SECS + 1);
        let issued =
            ChallengeSession::issue_at(CeremonyKind::Authentication, "u1", pending("c1"), issued_at);
        let err = ChallengeSession::redeem(Some(issued), CeremonyKind::Authentication, Utc::now());
        assert!(matches!(err, Err(AppError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_slot_take_is_single_use() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let slot = ChallengeSlot::new(&session);

        slot.bind(&ChallengeSession::issue(
            CeremonyKind::Registration,
            "u1",
            pending("first"),
        ))
        .await
        .unwrap();
        slot.bind(&ChallengeSession::issue(
            CeremonyKind::Registration,
            "u1",
            pending("second"),
        ))
        .await
        .unwrap();

        let taken = slot.take().await.unwrap().unwrap();
        assert_eq!(taken.challenge, "second");
        assert!(slot.take().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_persists_removal() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store.clone(), None);
        let slot = ChallengeSlot::new(&session);

        slot.bind(&ChallengeSession::issue(
            CeremonyKind::Authentication,
            "u1",
            pending("c1"),
        ))
        .await
        .unwrap();
        session.save().await.unwrap();
        let id = session.id();
        assert!(id.is_some());

        slot.take().await.unwrap().unwrap();

        // Another request with the same cookie, no further save in between
        let reloaded = Session::new(id, store, None);
        let stored: Option<ChallengeSession> = reloaded.get(CEREMONY_KEY).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_deadline_survives_later_requests() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store.clone(), None);
        let before = OffsetDateTime::now_utc();

        ChallengeSlot::new(&session)
            .bind(&ChallengeSession::issue(
                CeremonyKind::Registration,
                "u1",
                pending("first"),
            ))
            .await
            .unwrap();
        let Some(Expiry::AtDateTime(deadline)) = session.expiry() else {
            panic!("expected an absolute expiry, got {:?}", session.expiry());
        };
        let lifetime = time::Duration::hours(SESSION_LIFETIME_HOURS);
        assert!(deadline >= before + lifetime);
        assert!(deadline <= OffsetDateTime::now_utc() + lifetime);
        session.save().await.unwrap();

        // A later request loads the same record without any layer expiry
        let later = Session::new(session.id(), store, None);
        assert!(later.expiry().is_none());
        ChallengeSlot::new(&later)
            .bind(&ChallengeSession::issue(
                CeremonyKind::Registration,
                "u1",
                pending("second"),
            ))
            .await
            .unwrap();
        let Some(Expiry::AtDateTime(again)) = later.expiry() else {
            panic!("expected an absolute expiry, got {:?}", later.expiry());
        };
        assert_eq!(again.unix_timestamp(), deadline.unix_timestamp());
    }
}
