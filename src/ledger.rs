/// Subscriber ledger: reconciles the persisted subscriber set against the
/// inbound bot command feed.
///
/// The feed is append-only and delivered at-least-once, so every operation
/// here is idempotent: a replayed `/start` neither duplicates the
/// subscriber nor moves the cursor past where it already is, and a
/// replayed `/stop` is a no-op. Messages are applied strictly in the order
/// received.

use crate::model::{InboundMessage, PersistedState};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What changed while applying a batch, so the pipeline knows who to greet
/// and who to wave off. Ids appear in feed order, once each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerOutcome {
    /// Chats that newly subscribed and should receive the current status.
    pub welcomed: Vec<i64>,
    /// Chats that unsubscribed and should receive a goodbye confirmation.
    pub departed: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Merges seed subscriber ids supplied out-of-band (CLI/config) into the
/// set. Returns how many were actually new. Seeds never trigger welcome
/// messages; they are assumed to already know about the service.
pub fn merge_seeds(state: &mut PersistedState, seeds: &[i64]) -> usize {
    seeds
        .iter()
        .filter(|id| state.subscriber_ids.insert(**id))
        .count()
}

/// Applies one batch of inbound messages to the subscriber set and cursor.
///
/// Command matching is case-insensitive with surrounding whitespace
/// trimmed; anything that is not exactly `/start` or `/stop` is ignored
/// (its update_id still advances the cursor, so it is not refetched).
pub fn apply_updates(state: &mut PersistedState, batch: &[InboundMessage]) -> LedgerOutcome {
    let mut outcome = LedgerOutcome::default();

    for msg in batch {
        state.advance_cursor(msg.update_id);

        match msg.text.trim().to_ascii_lowercase().as_str() {
            "/start" => {
                if state.subscriber_ids.insert(msg.chat_id) {
                    outcome.welcomed.push(msg.chat_id);
                }
            }
            "/stop" => {
                if state.subscriber_ids.remove(&msg.chat_id) {
                    outcome.departed.push(msg.chat_id);
                }
            }
            _ => {}
        }
    }

    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(update_id: i64, chat_id: i64, text: &str) -> InboundMessage {
        InboundMessage { update_id, chat_id, text: text.to_string() }
    }

    fn state_with(subs: &[i64]) -> PersistedState {
        let mut st = PersistedState::default();
        st.subscriber_ids.extend(subs.iter().copied());
        st
    }

    // --- Worked examples ---------------------------------------------------

    #[test]
    fn test_start_and_stop_batch_reconciles_set_and_cursor() {
        let mut st = state_with(&[111, 222]);
        let batch = vec![msg(5, 333, "/start"), msg(6, 111, "/stop")];

        let outcome = apply_updates(&mut st, &batch);

        let subs: Vec<i64> = st.subscriber_ids.iter().copied().collect();
        assert_eq!(subs, vec![222, 333]);
        assert_eq!(st.last_update_id, Some(6));
        assert_eq!(outcome.welcomed, vec![333]);
        assert_eq!(outcome.departed, vec![111]);
    }

    // --- Idempotence --------------------------------------------------------

    #[test]
    fn test_replayed_start_is_a_no_op() {
        let mut st = PersistedState::default();
        let batch = vec![msg(5, 333, "/start")];

        let first = apply_updates(&mut st, &batch);
        assert_eq!(first.welcomed, vec![333]);
        assert_eq!(st.last_update_id, Some(5));

        // At-least-once delivery replays the same update.
        let second = apply_updates(&mut st, &batch);
        assert_eq!(second.welcomed, Vec::<i64>::new(), "replay must not re-welcome");
        assert_eq!(st.subscriber_ids.len(), 1, "replay must not duplicate the subscriber");
        assert_eq!(st.last_update_id, Some(5), "replay must not move the cursor");
    }

    #[test]
    fn test_duplicate_start_within_one_batch_welcomes_once() {
        let mut st = PersistedState::default();
        let batch = vec![msg(1, 333, "/start"), msg(2, 333, "/start")];
        let outcome = apply_updates(&mut st, &batch);
        assert_eq!(outcome.welcomed, vec![333]);
        assert_eq!(st.subscriber_ids.len(), 1);
        assert_eq!(st.last_update_id, Some(2));
    }

    #[test]
    fn test_stop_for_unknown_chat_is_a_no_op() {
        let mut st = state_with(&[111]);
        let outcome = apply_updates(&mut st, &[msg(1, 999, "/stop")]);
        assert!(outcome.departed.is_empty());
        assert_eq!(st.subscriber_ids.len(), 1);
        assert_eq!(st.last_update_id, Some(1), "cursor still advances past the no-op");
    }

    // --- Command parsing ----------------------------------------------------

    #[test]
    fn test_commands_match_case_insensitively_and_trimmed() {
        let mut st = PersistedState::default();
        let outcome = apply_updates(&mut st, &[msg(1, 10, "  /START \n")]);
        assert_eq!(outcome.welcomed, vec![10]);

        let outcome = apply_updates(&mut st, &[msg(2, 10, "/Stop")]);
        assert_eq!(outcome.departed, vec![10]);
    }

    #[test]
    fn test_unrelated_text_is_ignored_but_advances_cursor() {
        let mut st = PersistedState::default();
        let outcome = apply_updates(&mut st, &[msg(7, 10, "hello"), msg(8, 10, "/starting")]);
        assert!(outcome.welcomed.is_empty());
        assert!(st.subscriber_ids.is_empty());
        assert_eq!(st.last_update_id, Some(8));
    }

    #[test]
    fn test_start_then_stop_in_one_batch_lands_unsubscribed() {
        let mut st = PersistedState::default();
        let outcome = apply_updates(&mut st, &[msg(1, 10, "/start"), msg(2, 10, "/stop")]);
        assert_eq!(outcome.welcomed, vec![10]);
        assert_eq!(outcome.departed, vec![10]);
        assert!(st.subscriber_ids.is_empty(), "order received wins: the stop was last");
    }

    // --- Seeds --------------------------------------------------------------

    #[test]
    fn test_seeds_merge_idempotently() {
        let mut st = state_with(&[111]);
        let added = merge_seeds(&mut st, &[111, 444, 444]);
        assert_eq!(added, 1, "only 444 is new; the duplicate seed counts once");
        assert!(st.subscriber_ids.contains(&444));
        assert_eq!(st.subscriber_ids.len(), 2);
    }

    #[test]
    fn test_seeded_subscriber_can_still_stop() {
        let mut st = PersistedState::default();
        merge_seeds(&mut st, &[555]);
        let outcome = apply_updates(&mut st, &[msg(1, 555, "/stop")]);
        assert_eq!(outcome.departed, vec![555]);
        assert!(st.subscriber_ids.is_empty());
    }
}
