pub mod logger;
pub mod signature;

pub use logger::ExecLogger;
pub use signature::SignatureHelper;
