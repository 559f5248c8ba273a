//! ESPN sports source.
//!
//! Two payload shapes are supported: league scoreboards (`.../scoreboard`),
//! where a game counts when the tracked team is the home side, and team
//! pages (`.../teams/{id}`), where a game counts when it is played at the
//! team's home venue. Home/away is always taken from the `homeAway` flag;
//! ESPN does not guarantee competitor order.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{ScoreboardFeedConfig, SportsConfig, TeamScheduleFeedConfig};
use crate::events::window::{Day, TimeWindow};
use crate::events::{decode_json, send_checked, DayEvents, Event, EventSource, SourceError};

/// ESPN start times, e.g. "2026-02-14T20:00Z".
const ESPN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

const STATUS_CANCELED: &str = "STATUS_CANCELED";

/// Every configured ESPN feed, queried one after another.
pub struct SportsSource {
    client: reqwest::Client,
    scoreboards: Vec<ScoreboardFeedConfig>,
    team_schedules: Vec<TeamScheduleFeedConfig>,
}

impl SportsSource {
    pub fn new(client: reqwest::Client, config: &SportsConfig) -> Self {
        Self {
            client,
            scoreboards: config.scoreboards.clone(),
            team_schedules: config.team_schedules.clone(),
        }
    }

    async fn fetch_scoreboard(
        &self,
        feed: &ScoreboardFeedConfig,
        window: &TimeWindow,
    ) -> Result<DayEvents, SourceError> {
        let origin = format!("espn:{}", feed.team_name);
        info!(url = %feed.url, team = %feed.team_name, "querying ESPN scoreboard");

        let response = send_checked(self.client.get(&feed.url), &origin).await?;
        let payload: ScoreboardResponse = decode_json(response, &origin).await?;
        normalize_scoreboard(&payload, feed, window)
    }

    async fn fetch_team_schedule(
        &self,
        feed: &TeamScheduleFeedConfig,
        window: &TimeWindow,
    ) -> Result<DayEvents, SourceError> {
        let origin = format!("espn:{}", feed.team_name);
        info!(url = %feed.url, team = %feed.team_name, "querying ESPN team schedule");

        let response = send_checked(self.client.get(&feed.url), &origin).await?;
        let payload: TeamResponse = decode_json(response, &origin).await?;
        normalize_team_schedule(&payload, feed, window)
    }
}

#[async_trait]
impl EventSource for SportsSource {
    async fn fetch(&self, window: &TimeWindow) -> Result<DayEvents, SourceError> {
        let mut found = DayEvents::default();

        for feed in &self.scoreboards {
            found.extend(self.fetch_scoreboard(feed, window).await?);
        }
        for feed in &self.team_schedules {
            found.extend(self.fetch_team_schedule(feed, window).await?);
        }

        Ok(found)
    }

    fn name(&self) -> &str {
        "espn_sports"
    }
}

/// Home games for `feed.abbreviation` on either day of the window.
fn normalize_scoreboard(
    payload: &ScoreboardResponse,
    feed: &ScoreboardFeedConfig,
    window: &TimeWindow,
) -> Result<DayEvents, SourceError> {
    let origin = format!("espn:{}", feed.team_name);
    let mut found = DayEvents::default();

    for event in &payload.events {
        let Some(competition) = event.competitions.first() else {
            warn!(team = %feed.team_name, "scoreboard event has no competitions");
            continue;
        };
        let Some((home, away)) = split_home_away(&competition.competitors) else {
            info!(team = %feed.team_name, "skipping event without a home and away side");
            continue;
        };
        if home.team.abbreviation != feed.abbreviation {
            continue;
        }

        let raw_start = competition
            .start_date
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&competition.date);
        let start = parse_start(raw_start, &origin)?;

        if competition.status.kind.name == STATUS_CANCELED {
            info!(team = %feed.team_name, opponent = %away.team.display_name, "skipping canceled game");
            continue;
        }

        let Some(day) = window.classify(start) else {
            continue;
        };
        record(
            &mut found,
            day,
            window,
            &feed.team_name,
            &away.team.display_name,
            &competition.venue.full_name,
            start,
        );
    }

    Ok(found)
}

/// Upcoming games for one team, kept only when played at its home venue.
fn normalize_team_schedule(
    payload: &TeamResponse,
    feed: &TeamScheduleFeedConfig,
    window: &TimeWindow,
) -> Result<DayEvents, SourceError> {
    let origin = format!("espn:{}", feed.team_name);

    if payload.team.id.is_empty() {
        return Err(SourceError::MissingIdentity { origin, field: "team.id" });
    }
    if payload.team.uid.is_empty() {
        return Err(SourceError::MissingIdentity { origin, field: "team.uid" });
    }

    let mut found = DayEvents::default();

    for next in &payload.team.next_event {
        let Some(competition) = next.competitions.first() else {
            warn!(team = %feed.team_name, "no games found");
            continue;
        };

        let count = competition.competitors.len();
        if count < 2 {
            warn!(team = %feed.team_name, count, "insufficient competitors");
            continue;
        }
        if count > 2 {
            warn!(team = %feed.team_name, count, "unexpected number of competitors");
        }

        let Some((_, away)) = split_home_away(&competition.competitors) else {
            info!(team = %feed.team_name, "skipping game without a home and away side");
            continue;
        };

        let start = parse_start(&competition.date, &origin)?;

        if competition.venue.full_name != feed.home_venue {
            continue;
        }
        if competition.status.kind.name == STATUS_CANCELED {
            info!(team = %feed.team_name, opponent = %away.team.display_name, "skipping canceled game");
            continue;
        }

        let Some(day) = window.classify(start) else {
            continue;
        };
        record(
            &mut found,
            day,
            window,
            &feed.team_name,
            &away.team.display_name,
            &competition.venue.full_name,
            start,
        );
    }

    Ok(found)
}

fn record(
    found: &mut DayEvents,
    day: Day,
    window: &TimeWindow,
    team: &str,
    opponent: &str,
    venue: &str,
    start: DateTime<Utc>,
) {
    info!(team, opponent, ?day, "found game");
    found.push(
        day,
        Event::game(
            team,
            opponent,
            venue,
            window.format_local_time(start),
            start.timestamp(),
        ),
    );
}

/// `(home, away)` by flag. `None` when no competitor is flagged home.
fn split_home_away(competitors: &[Competitor]) -> Option<(&Competitor, &Competitor)> {
    let home = competitors.iter().position(|c| c.home_away == "home")?;
    let away = competitors
        .iter()
        .enumerate()
        .find(|(i, c)| *i != home && c.home_away == "away")
        .or_else(|| competitors.iter().enumerate().find(|(i, _)| *i != home))
        .map(|(_, c)| c)?;
    Some((&competitors[home], away))
}

fn parse_start(value: &str, origin: &str) -> Result<DateTime<Utc>, SourceError> {
    NaiveDateTime::parse_from_str(value, ESPN_TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|error| {
            tracing::error!(origin, value, "could not parse start time");
            SourceError::InvalidTime {
                origin: origin.to_string(),
                value: value.to_string(),
                error,
            }
        })
}

// --- ESPN API Response Types ---

#[derive(Debug, Deserialize)]
struct ScoreboardResponse {
    events: Vec<ScoreboardEvent>,
}

#[derive(Debug, Deserialize)]
struct ScoreboardEvent {
    #[serde(default)]
    competitions: Vec<Competition>,
}

#[derive(Debug, Deserialize)]
struct TeamResponse {
    #[serde(default)]
    team: TeamDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    next_event: Vec<ScoreboardEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Competition {
    #[serde(default)]
    date: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    venue: Venue,
    #[serde(default)]
    competitors: Vec<Competitor>,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(rename = "type", default)]
    kind: StatusType,
}

#[derive(Debug, Default, Deserialize)]
struct StatusType {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Venue {
    #[serde(default)]
    full_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Competitor {
    #[serde(default)]
    home_away: String,
    #[serde(default)]
    team: Team,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Team {
    #[serde(default)]
    abbreviation: String,
    #[serde(default)]
    display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::America::Los_Angeles;
    use serde_json::json;

    fn window() -> TimeWindow {
        TimeWindow::for_date(NaiveDate::from_ymd_opt(2026, 7, 30).unwrap(), Los_Angeles).unwrap()
    }

    fn sounders() -> ScoreboardFeedConfig {
        ScoreboardFeedConfig {
            team_name: "Seattle Sounders".to_string(),
            url: "http://unused".to_string(),
            abbreviation: "SEA".to_string(),
        }
    }

    fn huskies() -> TeamScheduleFeedConfig {
        TeamScheduleFeedConfig {
            team_name: "Washington Huskies (Football)".to_string(),
            url: "http://unused".to_string(),
            home_venue: "Husky Stadium".to_string(),
        }
    }

    fn competitor(home_away: &str, abbreviation: &str, name: &str) -> serde_json::Value {
        json!({
            "homeAway": home_away,
            "team": { "abbreviation": abbreviation, "displayName": name }
        })
    }

    fn scoreboard(competitors: Vec<serde_json::Value>, start: &str, status: &str) -> ScoreboardResponse {
        serde_json::from_value(json!({
            "events": [{
                "competitions": [{
                    "date": start,
                    "startDate": start,
                    "status": { "type": { "name": status } },
                    "venue": { "fullName": "Lumen Field" },
                    "competitors": competitors
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_scoreboard_home_listed_second() {
        let payload = scoreboard(
            vec![
                competitor("away", "PUM", "Pumas UNAM"),
                competitor("home", "SEA", "Seattle Sounders FC"),
            ],
            "2026-07-31T02:30Z",
            "STATUS_SCHEDULED",
        );
        let found = normalize_scoreboard(&payload, &sounders(), &window()).unwrap();
        assert_eq!(found.today.len(), 1);
        let game = &found.today[0];
        assert_eq!(game.opponent(), Some("Pumas UNAM"));
        assert_eq!(game.team(), Some("Seattle Sounders"));
        assert_eq!(game.venue(), Some("Lumen Field"));
        assert_eq!(game.local_time(), Some("7:30 PM"));
    }

    #[test]
    fn test_scoreboard_skips_away_games() {
        let payload = scoreboard(
            vec![
                competitor("home", "PUM", "Pumas UNAM"),
                competitor("away", "SEA", "Seattle Sounders FC"),
            ],
            "2026-07-31T02:30Z",
            "STATUS_SCHEDULED",
        );
        let found = normalize_scoreboard(&payload, &sounders(), &window()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_scoreboard_skips_canceled() {
        let payload = scoreboard(
            vec![
                competitor("home", "SEA", "Seattle Sounders FC"),
                competitor("away", "PUM", "Pumas UNAM"),
            ],
            "2026-07-31T02:30Z",
            STATUS_CANCELED,
        );
        let found = normalize_scoreboard(&payload, &sounders(), &window()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_scoreboard_tomorrow_and_outside_window() {
        let tomorrow = scoreboard(
            vec![
                competitor("home", "SEA", "Seattle Sounders FC"),
                competitor("away", "PUM", "Pumas UNAM"),
            ],
            "2026-07-31T19:00Z",
            "STATUS_SCHEDULED",
        );
        let found = normalize_scoreboard(&tomorrow, &sounders(), &window()).unwrap();
        assert_eq!(found.tomorrow.len(), 1);
        assert!(found.today.is_empty());

        let later = scoreboard(
            vec![
                competitor("home", "SEA", "Seattle Sounders FC"),
                competitor("away", "PUM", "Pumas UNAM"),
            ],
            "2026-08-02T02:00Z",
            "STATUS_SCHEDULED",
        );
        assert!(normalize_scoreboard(&later, &sounders(), &window())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_scoreboard_bad_time_is_error() {
        let payload = scoreboard(
            vec![
                competitor("home", "SEA", "Seattle Sounders FC"),
                competitor("away", "PUM", "Pumas UNAM"),
            ],
            "July 31st",
            "STATUS_SCHEDULED",
        );
        let err = normalize_scoreboard(&payload, &sounders(), &window()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidTime { .. }));
    }

    #[test]
    fn test_scoreboard_requires_events_key() {
        let quiet_day: ScoreboardResponse = serde_json::from_value(json!({ "events": [] })).unwrap();
        assert!(normalize_scoreboard(&quiet_day, &sounders(), &window())
            .unwrap()
            .is_empty());

        let not_found = serde_json::from_value::<ScoreboardResponse>(
            json!({ "code": 404, "message": "league not found" }),
        );
        assert!(not_found.is_err());
    }

    fn team_page(venue: &str, competitors: Vec<serde_json::Value>) -> TeamResponse {
        serde_json::from_value(json!({
            "team": {
                "id": "264",
                "uid": "s:20~l:23~t:264",
                "nextEvent": [{
                    "competitions": [{
                        "date": "2026-07-31T01:30Z",
                        "venue": { "fullName": venue },
                        "status": { "type": { "name": "STATUS_SCHEDULED" } },
                        "competitors": competitors
                    }]
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_team_schedule_home_game() {
        let payload = team_page(
            "Husky Stadium",
            vec![
                competitor("away", "ORE", "Oregon Ducks"),
                competitor("home", "WASH", "Washington Huskies"),
            ],
        );
        let found = normalize_team_schedule(&payload, &huskies(), &window()).unwrap();
        assert_eq!(found.today.len(), 1);
        assert_eq!(found.today[0].opponent(), Some("Oregon Ducks"));
        assert_eq!(found.today[0].local_time(), Some("6:30 PM"));
    }

    #[test]
    fn test_team_schedule_other_venue_discarded() {
        let payload = team_page(
            "Autzen Stadium",
            vec![
                competitor("home", "ORE", "Oregon Ducks"),
                competitor("away", "WASH", "Washington Huskies"),
            ],
        );
        let found = normalize_team_schedule(&payload, &huskies(), &window()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_team_schedule_single_competitor_skipped() {
        let payload = team_page(
            "Husky Stadium",
            vec![competitor("home", "WASH", "Washington Huskies")],
        );
        let found = normalize_team_schedule(&payload, &huskies(), &window()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_team_schedule_missing_identity() {
        let payload: TeamResponse =
            serde_json::from_value(json!({ "team": { "id": "", "uid": "" } })).unwrap();
        let err = normalize_team_schedule(&payload, &huskies(), &window()).unwrap_err();
        assert!(matches!(
            err,
            SourceError::MissingIdentity { field: "team.id", .. }
        ));

        let empty: TeamResponse = serde_json::from_value(json!({})).unwrap();
        assert!(normalize_team_schedule(&empty, &huskies(), &window()).is_err());
    }

    #[test]
    fn test_split_requires_home_flag() {
        let competitors: Vec<Competitor> = serde_json::from_value(json!([
            { "homeAway": "", "team": { "abbreviation": "A", "displayName": "A" } },
            { "homeAway": "", "team": { "abbreviation": "B", "displayName": "B" } }
        ]))
        .unwrap();
        assert!(split_home_away(&competitors).is_none());
    }
}
