pub mod derivation;
pub mod models;
