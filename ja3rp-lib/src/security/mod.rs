pub mod access;

pub use access::{load_list, parse_list, AccessDecision, AccessList, DenyReason};
