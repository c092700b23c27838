//! External collaborators: the currency-rate gateway and the push relay.

pub mod notifier;
pub mod push;
pub mod rates;

pub use push::{PushError, PushMessage, PushSender, RelayPushClient};
pub use rates::{CdnRateClient, RateError, RateSource};
