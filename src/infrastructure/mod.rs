pub mod clients;
pub mod secrets;
