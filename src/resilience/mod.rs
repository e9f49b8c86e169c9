pub mod guard;
pub mod policy;

pub use guard::catch_encode_panic;
pub use policy::FailurePolicy;
