//! Vote-boosted ranking over full-text matches.

use std::cmp::Ordering;

use reelstat_core::model::Title;

use crate::views::SearchHit;

/// Turn free text into an FTS5 query matching any of its words.
///
/// Each word is quoted so FTS5 operators in the input are taken literally.
/// Returns `None` when the text has no words.
pub fn match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// `floor(log10(votes)) + 1`; titles without votes count as one vote.
pub fn vote_boost(votes: Option<u64>) -> f64 {
    let votes = votes.unwrap_or(0).max(1);
    f64::from(votes.ilog10() + 1)
}

/// Score raw matches, order by `(score desc, votes desc)` and keep `limit`.
pub fn rank(hits: Vec<(Title, f64)>, limit: usize) -> Vec<SearchHit> {
    let mut ranked: Vec<SearchHit> = hits
        .into_iter()
        .map(|(title, relevance)| {
            let score = relevance * vote_boost(title.votes);
            SearchHit { title, score }
        })
        .collect();

    ranked.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => b.title.votes.cmp(&a.title.votes),
        other => other,
    });
    ranked.truncate(limit);
    ranked
}
