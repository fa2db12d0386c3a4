pub mod router;
pub mod traits;
pub mod ui;
pub mod webhook;

pub use router::AlertRouter;
pub use traits::{AlertPayload, AlertSink};
pub use ui::UiAlertSink;
pub use webhook::WebhookAlertSink;
