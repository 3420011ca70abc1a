mod classify;
pub mod config;
mod convert;
mod dedup;
mod event;
pub mod path;
pub mod persist;
pub mod plans;
pub mod rates;
mod relay;
pub mod render;
pub mod socketio;
mod state;
pub mod template;
pub mod transport;
mod watch;

pub use classify::{Alert, BITS_PER_UNIT, classify};
pub use config::{Config, ConfigError, TemplateFile};
pub use convert::{ConvertError, Converter};
pub use dedup::DedupFilter;
pub use event::{DecodeError, EventKind, InboundEvent, Message, decode};
pub use plans::Plan;
pub use rates::{RateTable, RatesError};
pub use relay::{Inbound, Outcome, Relay, RelayError, RelayHandle, Session, TOTAL_PATH};
pub use render::{Renderer, RenderReport};
pub use state::{StateStore, Subscriber};
pub use template::{Template, TemplateError};
pub use watch::{DEFAULT_DEBOUNCE, StateWatcher};
