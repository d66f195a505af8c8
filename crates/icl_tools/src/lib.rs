#![forbid(unsafe_code)]

pub mod credentials_cli;
