//! Leaderboard recomputation.
//!
//! Every pass recomputes every user's aggregates from the stored verdicts and
//! reassigns every rank, so the outcome only depends on the database contents.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::verdict::Verdict;

/// An AC submission as seen by the ranking pass
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AcceptedSubmission {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    /// Sum of the elapsed times of the submission's AC result rows
    pub ac_time_ms: i64,
    pub memory_kb: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAggregate {
    pub user_id: i64,
    pub solved: usize,
    pub total_time_ms: i64,
    pub total_memory_kb: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankingSummary {
    pub ranked: usize,
    pub unranked: usize,
}

/// Aggregates one user's earliest AC submission per problem.
///
/// `accepted` may contain other users' submissions, they are skipped.
/// Returns `None` for a user without any AC submission.
pub fn compute_aggregate(user_id: i64, accepted: &[AcceptedSubmission]) -> Option<UserAggregate> {
    let mut earliest: BTreeMap<i64, &AcceptedSubmission> = BTreeMap::new();
    for sub in accepted.iter().filter(|s| s.user_id == user_id) {
        earliest
            .entry(sub.problem_id)
            .and_modify(|best| {
                if sub.id < best.id {
                    *best = sub;
                }
            })
            .or_insert(sub);
    }

    if earliest.is_empty() {
        return None;
    }

    Some(UserAggregate {
        user_id,
        solved: earliest.len(),
        total_time_ms: earliest.values().map(|s| s.ac_time_ms).sum(),
        total_memory_kb: earliest.values().map(|s| s.memory_kb.unwrap_or(0)).sum(),
    })
}

/// Orders users by solved count (desc), time (asc), memory (asc) and gives
/// each a distinct 1-based rank. Equal keys keep ascending user id order.
pub fn assign_ranks(mut aggregates: Vec<UserAggregate>) -> Vec<(UserAggregate, i64)> {
    aggregates.sort_by_key(|a| a.user_id);
    aggregates.sort_by(|a, b| {
        b.solved
            .cmp(&a.solved)
            .then(a.total_time_ms.cmp(&b.total_time_ms))
            .then(a.total_memory_kb.cmp(&b.total_memory_kb))
    });

    aggregates
        .into_iter()
        .enumerate()
        .map(|(idx, agg)| (agg, idx as i64 + 1))
        .collect()
}

/// Recomputes aggregates and ranks for all users in a single transaction.
///
/// Users without an AC submission get null aggregates and a null rank.
pub async fn recompute_all(pool: &SqlitePool) -> anyhow::Result<RankingSummary> {
    let mut tx = pool.begin().await?;

    let user_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
        .fetch_all(tx.as_mut())
        .await?;

    let accepted = sqlx::query_as::<_, AcceptedSubmission>(
        r"
        SELECT s.id, s.user_id, s.problem_id, s.memory_kb,
               COALESCE((SELECT SUM(r.time_ms)
                         FROM submission_results r
                         WHERE r.submission_id = s.id AND r.status = ?), 0) AS ac_time_ms
        FROM submissions s
        WHERE s.verdict = ?
        ORDER BY s.id
        ",
    )
    .bind(Verdict::Ac.as_str())
    .bind(Verdict::Ac.as_str())
    .fetch_all(tx.as_mut())
    .await?;

    let mut by_user: HashMap<i64, Vec<AcceptedSubmission>> = HashMap::new();
    for sub in accepted {
        by_user.entry(sub.user_id).or_default().push(sub);
    }

    let aggregates: Vec<UserAggregate> = user_ids
        .iter()
        .filter_map(|id| {
            by_user
                .get(id)
                .and_then(|subs| compute_aggregate(*id, subs))
        })
        .collect();
    let ranked = assign_ranks(aggregates);

    sqlx::query("UPDATE users SET total_time_ms = NULL, total_memory_kb = NULL, rank = NULL")
        .execute(tx.as_mut())
        .await?;

    for (agg, rank) in &ranked {
        sqlx::query(
            "UPDATE users SET total_time_ms = ?, total_memory_kb = ?, rank = ? WHERE id = ?",
        )
        .bind(agg.total_time_ms)
        .bind(agg.total_memory_kb)
        .bind(*rank)
        .bind(agg.user_id)
        .execute(tx.as_mut())
        .await?;
    }

    tx.commit().await?;

    Ok(RankingSummary {
        ranked: ranked.len(),
        unranked: user_ids.len() - ranked.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ac(id: i64, user_id: i64, problem_id: i64, ac_time_ms: i64, memory_kb: Option<i64>) -> AcceptedSubmission {
        AcceptedSubmission {
            id,
            user_id,
            problem_id,
            ac_time_ms,
            memory_kb,
        }
    }

    fn agg(user_id: i64, solved: usize, total_time_ms: i64, total_memory_kb: i64) -> UserAggregate {
        UserAggregate {
            user_id,
            solved,
            total_time_ms,
            total_memory_kb,
        }
    }

    #[test]
    fn test_earliest_ac_per_problem() {
        let subs = vec![
            ac(5, 1, 10, 300, Some(900)),
            ac(2, 1, 10, 100, Some(500)),
            ac(7, 1, 11, 200, None),
            ac(3, 2, 10, 1, Some(1)),
        ];
        assert_eq!(compute_aggregate(1, &subs), Some(agg(1, 2, 300, 500)));
        assert_eq!(compute_aggregate(3, &subs), None);
    }

    #[test]
    fn test_rank_order() {
        let ranked = assign_ranks(vec![agg(1, 2, 300, 10), agg(2, 2, 250, 10), agg(3, 3, 9_000, 10)]);
        let order: Vec<(i64, i64)> = ranked.iter().map(|(a, r)| (a.user_id, *r)).collect();
        assert_eq!(order, vec![(3, 1), (2, 2), (1, 3)]);
    }

    #[test]
    fn test_memory_breaks_time_ties_then_user_id() {
        let ranked = assign_ranks(vec![agg(9, 1, 100, 50), agg(4, 1, 100, 50), agg(2, 1, 100, 80)]);
        let order: Vec<(i64, i64)> = ranked.iter().map(|(a, r)| (a.user_id, *r)).collect();
        assert_eq!(order, vec![(4, 1), (9, 2), (2, 3)]);
    }

    #[test]
    fn test_empty_ranking() {
        assert!(assign_ranks(Vec::new()).is_empty());
    }
}
