#![forbid(unsafe_code)]

pub mod credential_auth;
pub mod hosted_auth;
pub mod ingress;
pub mod vault_model;
