//! JSON feed consumed by the static site and notification jobs.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::events::window::TimeWindow;
use crate::events::{Event, EventResults};

#[derive(Debug, Serialize)]
struct Feed<'a> {
    date: String,
    events: Vec<FeedEvent<'a>>,
    tomorrow_events: Vec<FeedEvent<'a>>,
}

#[derive(Debug, Serialize)]
struct FeedEvent<'a> {
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    venue: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opponent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_time: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unix_time: Option<i64>,
}

impl<'a> From<&'a Event> for FeedEvent<'a> {
    fn from(event: &'a Event) -> Self {
        let non_empty = |v: Option<&'a str>| v.filter(|s| !s.is_empty());
        Self {
            description: event.to_string(),
            venue: non_empty(event.venue()),
            team_name: non_empty(event.team()),
            opponent: non_empty(event.opponent()),
            local_time: non_empty(event.local_time()),
            unix_time: (event.start != 0).then_some(event.start),
        }
    }
}

/// Render the results as the published JSON document.
pub fn render_json(window: &TimeWindow, results: &EventResults) -> Result<String> {
    let feed = Feed {
        date: window.today().format("%Y-%m-%d").to_string(),
        events: results.today.iter().map(FeedEvent::from).collect(),
        tomorrow_events: results.tomorrow.iter().map(FeedEvent::from).collect(),
    };

    serde_json::to_string(&feed).context("could not render feed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn window() -> TimeWindow {
        TimeWindow::for_date(
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
            chrono_tz::America::Los_Angeles,
        )
        .unwrap()
    }

    #[test]
    fn test_render_game_and_freeform() {
        let results = EventResults {
            today: vec![Event::game(
                "Seattle Kraken",
                "Vancouver Canucks",
                "Climate Pledge Arena",
                "7:00 PM",
                1771124400,
            )],
            tomorrow: vec![Event::freeform("Parade downtown", 0)],
        };

        let rendered: Value = serde_json::from_str(&render_json(&window(), &results).unwrap()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "date": "2026-02-14",
                "events": [{
                    "description": "Seattle Kraken are playing against the Vancouver Canucks at Climate Pledge Arena. The game starts at 7:00 PM.",
                    "venue": "Climate Pledge Arena",
                    "team_name": "Seattle Kraken",
                    "opponent": "Vancouver Canucks",
                    "local_time": "7:00 PM",
                    "unix_time": 1771124400
                }],
                "tomorrow_events": [{ "description": "Parade downtown" }]
            })
        );
    }

    #[test]
    fn test_render_empty() {
        let rendered: Value =
            serde_json::from_str(&render_json(&window(), &EventResults::default()).unwrap()).unwrap();
        assert_eq!(rendered["events"], json!([]));
        assert_eq!(rendered["tomorrow_events"], json!([]));
    }
}
