use threadkeeper_core::{ErrorExt, LinkMap, LockOracle, PostRecord};
use tracing::{debug, info};

/// First record, oldest date first, that the oracle reports as still open.
///
/// A failed lock check is logged and treated as "not open" so one bad
/// lookup cannot hide later candidates.
pub async fn find_open_post<'a>(
    oracle: &dyn LockOracle,
    links: &'a LinkMap,
) -> Option<&'a PostRecord> {
    for record in links.values() {
        match oracle.is_locked(&record.identifier).await {
            Ok(false) => {
                info!("{} ({}) is still open", record.identifier, record.date);
                return Some(record);
            }
            Ok(true) => debug!("{} ({}) is locked", record.identifier, record.date),
            Err(e) => {
                e.log_warn();
            }
        }
    }
    None
}
