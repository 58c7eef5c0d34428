//! The matching rule: which existing session should a new arrival join?
//!
//! Deliberately the simplest thing that works: scan sessions in creation
//! order and take the FIRST one whose recorded interest set intersects
//! the candidate's. No ranking by overlap size, no preference for bigger
//! intersections — first match wins. That keeps matching O(sessions) with
//! zero scoring state, and it's the documented product behavior, not a
//! shortcut to optimize away.
//!
//! Capacity is also deliberately NOT checked here. The matcher answers
//! "which session was this candidate matched to?"; whether that session
//! has room is the coordinator's decision (a full match routes the
//! candidate to the overflow holding set instead).

use std::collections::HashSet;

use crate::Session;

/// Selects the first session (in creation order) whose `match_interests`
/// intersects `candidate_interests`. Returns `None` when nothing
/// overlaps.
pub fn select<'a, I>(
    candidate_interests: &HashSet<String>,
    sessions: I,
) -> Option<&'a Session>
where
    I: IntoIterator<Item = &'a Session>,
{
    sessions
        .into_iter()
        .find(|s| !s.match_interests.is_disjoint(candidate_interests))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_protocol::SessionId;
    use std::time::Duration;
    use tokio::time::Instant;

    fn interests(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn session(id: &str, match_interests: &[&str]) -> Session {
        Session {
            id: SessionId::new(id),
            participants: Vec::new(),
            match_interests: interests(match_interests),
            deadline: Instant::now() + Duration::from_secs(180),
            created_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_select_returns_none_when_no_overlap() {
        let sessions = [session("a", &["music"]), session("b", &["film"])];
        let result = select(&interests(&["cooking"]), &sessions);
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_select_returns_first_match_in_creation_order() {
        // Both sessions overlap; the earlier one wins even though the
        // later one overlaps on more interests.
        let sessions = [
            session("first", &["music"]),
            session("second", &["music", "film", "books"]),
        ];
        let result =
            select(&interests(&["music", "film", "books"]), &sessions);
        assert_eq!(result.unwrap().id, SessionId::new("first"));
    }

    #[tokio::test]
    async fn test_select_single_shared_interest_is_enough() {
        let sessions = [session("a", &["music", "hiking"])];
        let result = select(&interests(&["hiking", "chess"]), &sessions);
        assert_eq!(result.unwrap().id, SessionId::new("a"));
    }

    #[tokio::test]
    async fn test_select_ignores_capacity() {
        // A full session is still returned — routing a candidate who
        // matched a full session is the coordinator's job.
        use kindred_protocol::ParticipantId;
        use tokio::sync::mpsc;

        let mut full = session("full", &["music"]);
        for (id, name) in [(1, "alice"), (2, "bob")] {
            let (tx, _rx) = mpsc::unbounded_channel();
            full.participants.push(crate::Participant {
                id: ParticipantId(id),
                username: name.into(),
                interests: interests(&["music"]),
                outbox: tx,
            });
        }
        assert!(full.is_full());

        let sessions = [full];
        let result = select(&interests(&["music"]), &sessions);
        assert_eq!(result.unwrap().id, SessionId::new("full"));
    }

    #[tokio::test]
    async fn test_select_empty_candidate_interests_matches_nothing() {
        let sessions = [session("a", &["music"])];
        let result = select(&interests(&[]), &sessions);
        assert!(result.is_none());
    }
}
