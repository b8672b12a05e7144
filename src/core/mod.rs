pub mod clock;
pub mod config;
pub mod context;
pub mod db;

pub use clock::{CivilTime, Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use context::AppContext;
