pub mod deferred;
pub mod fan_in;
pub mod history;
pub mod lifecycle;
pub mod tick;
pub mod warmup;

pub use deferred::DeferredTicks;
pub use fan_in::{FanIn, FanInMessage};
pub use history::RollingHistory;
pub use lifecycle::{EngineCommand, EngineHandle};
pub use tick::{TickDone, TickEngine};
pub use warmup::WarmupGate;
