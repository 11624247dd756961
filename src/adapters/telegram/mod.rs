//! Telegram transport.
//!
//! - [`TelegramGateway`] implements `MessagingGateway` on a teloxide `Bot`
//! - [`to_inbound`] converts raw updates, whether polled or pushed
//! - [`run_polling`] feeds converted updates into a channel
//! - [`run_consumer`] drains that channel into `BotUpdateHandler`

mod consumer;
mod gateway;
mod polling;
mod updates;

pub use consumer::run_consumer;
pub use gateway::TelegramGateway;
pub use polling::{build_bot, prepare_webhook, run_polling};
pub use updates::to_inbound;
