// Core modules implementing the record channel, its line codec, and error modeling.
pub mod channel;
pub mod diagnostic;
pub mod error;
pub mod mode;
pub mod record;
