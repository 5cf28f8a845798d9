pub mod history;
pub mod status;
