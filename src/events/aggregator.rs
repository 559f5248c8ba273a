use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::events::window::TimeWindow;
use crate::events::{EventResults, EventSource, SourceError};

/// Run every source concurrently and merge what they find.
///
/// All-or-nothing: the first source to fail aborts the rest and its error
/// is returned. On success both days are sorted by start time.
pub async fn get_today_and_tomorrow_games(
    window: &TimeWindow,
    sources: &[Arc<dyn EventSource>],
) -> Result<EventResults, SourceError> {
    let results = Arc::new(Mutex::new(EventResults::default()));
    let mut tasks = JoinSet::new();

    for source in sources {
        let source = Arc::clone(source);
        let results = Arc::clone(&results);
        let window = *window;

        tasks.spawn(async move {
            let found = source.fetch(&window).await?;
            info!(
                source = source.name(),
                today = found.today.len(),
                tomorrow = found.tomorrow.len(),
                "source finished"
            );
            results.lock().await.append(found);
            Ok::<(), SourceError>(())
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| SourceError::Task {
                origin: "aggregator".to_string(),
                message: e.to_string(),
            })
            .and_then(|r| r);

        if let Err(e) = outcome {
            error!(error = %e, "source failed, cancelling the rest");
            tasks.abort_all();
            return Err(e);
        }
    }

    let mut merged = std::mem::take(&mut *results.lock().await);
    merged.finalize();

    info!(
        today = merged.today.len(),
        tomorrow = merged.tomorrow.len(),
        sources = sources.len(),
        "aggregation complete"
    );
    Ok(merged)
}
