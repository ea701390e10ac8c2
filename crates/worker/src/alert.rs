//! Negative-price alerting.

use broker::AlertPublisher;
use ingest_core::{PriceAlertEvent, PricePoint};
use tracing::{error, warn};

/// Publishes an alert when `point` is below zero.
///
/// Returns `true` only if an alert was published. Publish failures are
/// logged and never retried.
pub async fn maybe_alert(publisher: &dyn AlertPublisher, point: &PricePoint) -> bool {
    let Some(alert) = PriceAlertEvent::negative_price(point) else {
        return false;
    };

    warn!(
        price = point.price,
        timestamp = %point.timestamp,
        "Negative price detected, publishing alert"
    );

    match publisher.publish_alert(&alert).await {
        Ok(()) => true,
        Err(e) => {
            error!(timestamp = %point.timestamp, error = %e, "Failed to publish price alert");
            false
        }
    }
}
