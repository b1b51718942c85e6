pub mod emubd;
pub mod powerloss;
pub mod traits;

pub use emubd::{BdOp, EmuBd};
pub use powerloss::{PowerlossCounter, PowerlossRecorder, powerloss_counter};
pub use traits::{BdError, BdResult, BlockDevice};
