mod dispatch;
pub mod run;
pub mod transfer;

pub use dispatch::dispatch;
