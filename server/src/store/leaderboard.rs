use std::cmp::Ordering;

use serde::Serialize;

use super::PlayerStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub win_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_players: usize,
    pub limit: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardPage {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub pagination: Pagination,
}

/// Ranks players with at least one game by wins, then win percentage,
/// then name, and cuts out the requested 1-based page.
pub fn build_leaderboard<I>(players: I, page: usize, limit: usize) -> LeaderboardPage
where
    I: IntoIterator<Item = (String, PlayerStats)>,
{
    let page = page.max(1);
    let limit = limit.max(1);

    let mut ranked: Vec<LeaderboardEntry> = players
        .into_iter()
        .filter(|(_, stats)| stats.total_games() > 0)
        .map(|(username, stats)| LeaderboardEntry {
            username,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
            total_games: stats.total_games(),
            win_percentage: stats.win_percentage(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then_with(|| {
                b.win_percentage
                    .partial_cmp(&a.win_percentage)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.username.cmp(&b.username))
    });

    let total_players = ranked.len();
    let total_pages = total_players.div_ceil(limit);
    let leaderboard = ranked.into_iter().skip((page - 1).saturating_mul(limit)).take(limit).collect();

    LeaderboardPage {
        leaderboard,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_players,
            limit,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        },
    }
}
