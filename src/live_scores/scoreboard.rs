use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::provider::ScoreProvider;
use super::sports::detect_score_change;
use crate::error::RefreshError;
use crate::models::{GameStatus, LiveGame};
use crate::polling::{LivenessCheck, RefreshSource};

type ConsensusKey = (i32, i32, Option<i32>, GameStatus);

/// Consecutive refreshes an event may be absent from every answering provider
/// before it is dropped from the snapshot.
pub const MISSING_REFRESHES_BEFORE_EVICT: u32 = 3;

/// A provider's report for one event.
#[derive(Debug, Clone)]
struct Candidate {
    provider: String,
    trust: f64,
    game: LiveGame,
}

/// Pick the snapshot most providers agree on; ties go to the group with the
/// larger summed trust, then to the most trusted and most advanced report.
/// Returns the winning report and the size of its group.
fn select_consensus(candidates: Vec<Candidate>) -> Option<(Candidate, usize)> {
    let mut groups: HashMap<ConsensusKey, Vec<Candidate>> = HashMap::new();
    for c in candidates {
        let key = (c.game.home_score, c.game.away_score, c.game.minute, c.game.status);
        groups.entry(key).or_default().push(c);
    }

    let group = groups.into_values().max_by(|a, b| {
        let trust = |g: &Vec<Candidate>| g.iter().map(|c| c.trust).sum::<f64>();
        a.len()
            .cmp(&b.len())
            .then_with(|| trust(a).total_cmp(&trust(b)))
    })?;
    let agreeing = group.len();

    group
        .into_iter()
        .max_by(|a, b| {
            a.trust
                .total_cmp(&b.trust)
                .then_with(|| a.game.minute.unwrap_or(-1).cmp(&b.game.minute.unwrap_or(-1)))
        })
        .map(|c| (c, agreeing))
}

/// Live game snapshot kept fresh by the polling scheduler.
///
/// Each refresh polls every provider concurrently, merges their reports per
/// event by consensus, and folds the result into the snapshot. A game absent
/// from one response is kept; after [`MISSING_REFRESHES_BEFORE_EVICT`]
/// consecutive misses it is evicted so it cannot hold the liveness check open.
pub struct LiveScoreboard {
    providers: Vec<Arc<dyn ScoreProvider>>,
    provider_timeout: Duration,
    /// Event ids to follow; empty follows everything
    tracked: HashSet<String>,
    games: RwLock<HashMap<String, TrackedGame>>,
}

#[derive(Debug, Clone)]
struct TrackedGame {
    game: LiveGame,
    /// Successful refreshes in a row that did not report this event
    missed: u32,
}

impl LiveScoreboard {
    pub fn new(
        providers: Vec<Arc<dyn ScoreProvider>>,
        provider_timeout: Duration,
        tracked: impl IntoIterator<Item = String>,
    ) -> Self {
        LiveScoreboard {
            providers,
            provider_timeout,
            tracked: tracked.into_iter().collect(),
            games: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TrackedGame>> {
        self.games.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TrackedGame>> {
        self.games.write().unwrap_or_else(|e| e.into_inner())
    }

    fn is_tracked(&self, event_id: &str) -> bool {
        self.tracked.is_empty() || self.tracked.contains(event_id)
    }

    /// Tracked games ordered by event id.
    pub fn games(&self) -> Vec<LiveGame> {
        let mut games: Vec<LiveGame> = self.read().values().map(|t| t.game.clone()).collect();
        games.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        games
    }

    /// True when every known tracked game is finished, including when none
    /// are known yet.
    pub fn all_finished(&self) -> bool {
        self.read().values().all(|t| t.game.status == GameStatus::Finished)
    }

    pub fn liveness_check(self: &Arc<Self>) -> LivenessCheck {
        let board = Arc::clone(self);
        Box::new(move || board.all_finished())
    }

    async fn poll_providers(&self) -> Vec<(String, f64, anyhow::Result<Vec<LiveGame>>)> {
        let timeout = self.provider_timeout;
        let fetches = self.providers.iter().map(|p| async move {
            let result = match tokio::time::timeout(timeout, p.fetch_live_games()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", timeout)),
            };
            (p.name().to_string(), p.trust(), result)
        });
        join_all(fetches).await
    }
}

#[async_trait]
impl RefreshSource for LiveScoreboard {
    fn name(&self) -> &str {
        "live-scoreboard"
    }

    async fn refresh(&self) -> Result<(), RefreshError> {
        if self.providers.is_empty() {
            return Err(RefreshError::Upstream("no score providers configured".into()));
        }

        let mut by_event: HashMap<String, Vec<Candidate>> = HashMap::new();
        let mut failures = Vec::new();
        for (provider, trust, result) in self.poll_providers().await {
            match result {
                Ok(games) => {
                    for game in games.into_iter().filter(|g| self.is_tracked(&g.event_id)) {
                        by_event.entry(game.event_id.clone()).or_default().push(Candidate {
                            provider: provider.clone(),
                            trust,
                            game,
                        });
                    }
                }
                Err(e) => {
                    warn!("Provider '{}' failed: {:#}", provider, e);
                    failures.push(format!("{}: {}", provider, e));
                }
            }
        }
        if failures.len() == self.providers.len() {
            return Err(RefreshError::Upstream(failures.join("; ")));
        }

        let mut games = self.write();
        for (event_id, tracked) in games.iter_mut() {
            if by_event.contains_key(event_id) {
                tracked.missed = 0;
            } else {
                tracked.missed += 1;
            }
        }
        games.retain(|event_id, tracked| {
            let keep = tracked.missed < MISSING_REFRESHES_BEFORE_EVICT;
            if !keep {
                info!(
                    "Dropping {} {} vs {} ({:?}): not reported for {} refreshes",
                    event_id,
                    tracked.game.home_team,
                    tracked.game.away_team,
                    tracked.game.status,
                    tracked.missed
                );
            }
            keep
        });

        for candidates in by_event.into_values() {
            let Some((chosen, agreeing)) = select_consensus(candidates) else {
                continue;
            };
            let game = chosen.game;
            if let Some(TrackedGame { game: prev, .. }) = games.get(&game.event_id) {
                if let Some(change) = detect_score_change(prev, &game) {
                    info!(
                        "Score change: {} {} {}-{} {} [{}] via {} ({} agreeing)",
                        game.league,
                        game.home_team,
                        game.home_score,
                        game.away_score,
                        game.away_team,
                        change,
                        chosen.provider,
                        agreeing
                    );
                }
                if prev.status != GameStatus::Finished && game.status == GameStatus::Finished {
                    info!("Final: {} {}-{} {}", game.home_team, game.home_score, game.away_score, game.away_team);
                }
            }
            games.insert(game.event_id.clone(), TrackedGame { game, missed: 0 });
        }
        debug!("Scoreboard holds {} games", games.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedProvider {
        name: &'static str,
        trust: f64,
        games: Mutex<anyhow::Result<Vec<LiveGame>>>,
        hang: bool,
    }

    impl FixedProvider {
        fn ok(name: &'static str, trust: f64, games: Vec<LiveGame>) -> Arc<Self> {
            Arc::new(FixedProvider {
                name,
                trust,
                games: Mutex::new(Ok(games)),
                hang: false,
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(FixedProvider {
                name,
                trust: 0.5,
                games: Mutex::new(Err(anyhow::anyhow!("503 Service Unavailable"))),
                hang: false,
            })
        }

        fn hanging(name: &'static str) -> Arc<Self> {
            Arc::new(FixedProvider {
                name,
                trust: 1.0,
                games: Mutex::new(Ok(vec![])),
                hang: true,
            })
        }

        fn set(&self, games: Vec<LiveGame>) {
            *self.games.lock().unwrap() = Ok(games);
        }
    }

    #[async_trait]
    impl ScoreProvider for FixedProvider {
        async fn fetch_live_games(&self) -> anyhow::Result<Vec<LiveGame>> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            match &*self.games.lock().unwrap() {
                Ok(games) => Ok(games.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }

        fn name(&self) -> &str {
            self.name
        }

        fn trust(&self) -> f64 {
            self.trust
        }
    }

    fn game(id: &str, home: i32, away: i32, status: GameStatus) -> LiveGame {
        LiveGame {
            event_id: id.into(),
            sport: "american football".into(),
            league: "NFL".into(),
            home_team: "Home".into(),
            away_team: "Away".into(),
            home_score: home,
            away_score: away,
            minute: Some(30),
            status,
        }
    }

    fn dyn_providers(providers: Vec<Arc<FixedProvider>>) -> Vec<Arc<dyn ScoreProvider>> {
        providers
            .into_iter()
            .map(|p| p as Arc<dyn ScoreProvider>)
            .collect()
    }

    fn board(providers: Vec<Arc<FixedProvider>>) -> LiveScoreboard {
        LiveScoreboard::new(dyn_providers(providers), Duration::from_millis(50), Vec::new())
    }

    #[test]
    fn consensus_prefers_majority_over_trust() {
        let c = |provider: &str, trust, home| Candidate {
            provider: provider.into(),
            trust,
            game: game("1", home, 0, GameStatus::InProgress),
        };
        let (chosen, agreeing) =
            select_consensus(vec![c("a", 0.6, 7), c("b", 0.6, 7), c("c", 1.0, 3)]).unwrap();
        assert_eq!(chosen.game.home_score, 7);
        assert_eq!(agreeing, 2);

        let (chosen, _) = select_consensus(vec![c("low", 0.5, 7), c("high", 0.9, 3)]).unwrap();
        assert_eq!(chosen.provider, "high");
        assert!(select_consensus(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn refresh_merges_providers_and_tolerates_one_failure() {
        let a = FixedProvider::ok("a", 0.9, vec![game("1", 7, 0, GameStatus::InProgress)]);
        let b = FixedProvider::ok("b", 0.8, vec![game("2", 0, 3, GameStatus::InProgress)]);
        let sb = board(vec![a, b, FixedProvider::failing("c")]);
        sb.refresh().await.unwrap();
        let ids: Vec<String> = sb.games().into_iter().map(|g| g.event_id).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(!sb.all_finished());
    }

    #[tokio::test]
    async fn every_provider_failing_is_an_error() {
        let sb = board(vec![FixedProvider::failing("a"), FixedProvider::failing("b")]);
        let err = sb.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Upstream(msg) if msg.contains("503")));
        assert!(board(Vec::new()).refresh().await.is_err());
    }

    #[tokio::test]
    async fn hanging_provider_is_timed_out() {
        let ok = FixedProvider::ok("ok", 0.9, vec![game("1", 0, 0, GameStatus::NotStarted)]);
        let sb = board(vec![FixedProvider::hanging("slow"), ok]);
        tokio::time::timeout(Duration::from_secs(2), sb.refresh())
            .await
            .expect("refresh bounded by provider timeout")
            .unwrap();
        assert_eq!(sb.games().len(), 1);
    }

    #[tokio::test]
    async fn games_missing_from_a_response_are_kept() {
        let p = FixedProvider::ok(
            "p",
            0.9,
            vec![
                game("1", 0, 0, GameStatus::InProgress),
                game("2", 0, 0, GameStatus::InProgress),
            ],
        );
        let sb = board(vec![p.clone()]);
        sb.refresh().await.unwrap();
        p.set(vec![game("1", 6, 0, GameStatus::InProgress)]);
        sb.refresh().await.unwrap();
        let games = sb.games();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_score, 6);
    }

    #[tokio::test]
    async fn vanished_live_game_is_evicted_and_releases_liveness() {
        let p = FixedProvider::ok("p", 0.9, vec![game("1", 3, 0, GameStatus::InProgress)]);
        let sb = Arc::new(board(vec![p.clone()]));
        let check = sb.liveness_check();
        sb.refresh().await.unwrap();
        assert!(!check());

        p.set(Vec::new());
        for _ in 1..MISSING_REFRESHES_BEFORE_EVICT {
            sb.refresh().await.unwrap();
            assert_eq!(sb.games().len(), 1);
            assert!(!check());
        }
        sb.refresh().await.unwrap();
        assert!(sb.games().is_empty());
        assert!(check());
    }

    #[tokio::test]
    async fn reappearing_game_resets_its_miss_count() {
        let live = vec![game("1", 0, 0, GameStatus::InProgress)];
        let p = FixedProvider::ok("p", 0.9, live.clone());
        let sb = board(vec![p.clone()]);
        sb.refresh().await.unwrap();
        for _ in 0..MISSING_REFRESHES_BEFORE_EVICT * 2 {
            p.set(Vec::new());
            sb.refresh().await.unwrap();
            p.set(live.clone());
            sb.refresh().await.unwrap();
        }
        assert_eq!(sb.games().len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_does_not_count_as_a_miss() {
        let p = FixedProvider::ok("p", 0.9, vec![game("1", 0, 0, GameStatus::InProgress)]);
        let sb = board(vec![p.clone()]);
        sb.refresh().await.unwrap();
        *p.games.lock().unwrap() = Err(anyhow::anyhow!("502 Bad Gateway"));
        for _ in 0..MISSING_REFRESHES_BEFORE_EVICT + 1 {
            assert!(sb.refresh().await.is_err());
        }
        assert_eq!(sb.games().len(), 1);
        assert!(!sb.all_finished());
    }

    #[tokio::test]
    async fn liveness_tracks_finished_games() {
        let p = FixedProvider::ok("p", 0.9, vec![game("1", 3, 0, GameStatus::InProgress)]);
        let sb = Arc::new(board(vec![p.clone()]));
        let check = sb.liveness_check();
        // nothing known yet
        assert!(check());
        sb.refresh().await.unwrap();
        assert!(!check());
        p.set(vec![game("1", 3, 0, GameStatus::Finished)]);
        sb.refresh().await.unwrap();
        assert!(check());
    }

    #[tokio::test]
    async fn untracked_events_are_ignored() {
        let p = FixedProvider::ok(
            "p",
            0.9,
            vec![
                game("1", 0, 0, GameStatus::Finished),
                game("2", 0, 0, GameStatus::InProgress),
            ],
        );
        let sb = LiveScoreboard::new(
            dyn_providers(vec![p]),
            Duration::from_millis(50),
            vec!["1".to_string()],
        );
        sb.refresh().await.unwrap();
        assert_eq!(sb.games().len(), 1);
        assert!(sb.all_finished());
    }
}
