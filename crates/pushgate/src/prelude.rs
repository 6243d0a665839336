pub use pushgate_types::prelude::*;

pub use crate::app::{PushService, PushServiceBuilder};
pub use crate::push::{BatchResult, NotificationPayload, SendOutcome};

// vim: ts=4
