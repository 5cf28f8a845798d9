pub mod ledger;
pub mod models;
pub mod policy;
pub mod settings;
