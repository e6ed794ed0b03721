//! # Game Day Screen
//!
//! Lights the strip in the team's colors when the configured MLB team plays today
//! (local date). On days without a game the screen declines and the rotation moves
//! straight on to the next one.
//!
//! Schedules come from the public MLB stats API and are cached for
//! [`SPORTS_TTL_HOURS`]; the cache is dropped when the local date rolls over.

use crate::cache::{Cached, SPORTS_TTL_HOURS};
use crate::lamp::Lamp;
use crate::screen::{RenderError, Visual};
use crate::twilight::DataError;
use crate::RGB8;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::Deserialize;

/// A scheduled game.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub starts_at: DateTime<Utc>,
    pub status: String,
}

impl Game {
    /// Postponed and cancelled games don't count as "game today".
    pub fn is_on(&self) -> bool {
        !matches!(self.status.as_str(), "Postponed" | "Cancelled")
    }
}

/// Provider of a team's schedule.
pub trait ScheduleSource {
    fn games_on(&mut self, date: NaiveDate) -> Result<Vec<Game>, DataError>;
}

/// Team colors when the team plays today.
pub struct GameTodayScreen {
    source: Box<dyn ScheduleSource>,
    cache: Cached<Vec<Game>>,
    cached_date: Option<NaiveDate>,
    primary: RGB8,
    secondary: RGB8,
}

impl GameTodayScreen {
    pub fn new(source: Box<dyn ScheduleSource>, primary: RGB8, secondary: RGB8) -> Self {
        Self {
            source,
            cache: Cached::new(Duration::hours(SPORTS_TTL_HOURS)),
            cached_date: None,
            primary,
            secondary,
        }
    }

    fn games_today(&mut self, now: DateTime<Local>) -> Result<Vec<Game>, DataError> {
        let today = now.date_naive();
        if self.cached_date != Some(today) {
            self.cache.invalidate();
            self.cached_date = Some(today);
        }
        let source = &mut self.source;
        self.cache
            .get_or_refresh(now.with_timezone(&Utc), || source.games_on(today))
            .cloned()
    }
}

/// Alternate two colors along the strip.
pub fn alternating(primary: RGB8, secondary: RGB8, num_leds: usize) -> Vec<RGB8> {
    (0..num_leds)
        .map(|i| if i % 2 == 0 { primary } else { secondary })
        .collect()
}

impl Visual for GameTodayScreen {
    fn render(&mut self, lamp: &mut Lamp, now: DateTime<Local>) -> Result<bool, RenderError> {
        let games = self.games_today(now)?;
        if !games.iter().any(Game::is_on) {
            return Ok(false);
        }
        lamp.set_leds(&alternating(self.primary, self.secondary, lamp.num_leds()))?;
        Ok(true)
    }
}

const SCHEDULE_URL: &str = "https://statsapi.mlb.com/api/v1/schedule";

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    #[serde(default)]
    games: Vec<ScheduleGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleGame {
    game_date: DateTime<Utc>,
    status: GameStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameStatus {
    detailed_state: String,
}

impl ScheduleResponse {
    fn into_games(self) -> Vec<Game> {
        self.dates
            .into_iter()
            .flat_map(|d| d.games)
            .map(|g| Game {
                starts_at: g.game_date,
                status: g.status.detailed_state,
            })
            .collect()
    }
}

/// MLB stats API schedule for one team.
pub struct MlbSchedule {
    client: reqwest::blocking::Client,
    team_id: u32,
}

impl MlbSchedule {
    pub fn new(team_id: u32) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client, team_id })
    }
}

impl ScheduleSource for MlbSchedule {
    fn games_on(&mut self, date: NaiveDate) -> Result<Vec<Game>, DataError> {
        let team = self.team_id.to_string();
        let date = date.format("%Y-%m-%d").to_string();
        let response: ScheduleResponse = self
            .client
            .get(SCHEDULE_URL)
            .query(&[("sportId", "1"), ("teamId", team.as_str()), ("date", date.as_str())])
            .send()?
            .error_for_status()?
            .json()?;
        let games = response.into_games();
        log::debug!("Team {} has {} game(s) on {}", self.team_id, games.len(), date);
        Ok(games)
    }
}
