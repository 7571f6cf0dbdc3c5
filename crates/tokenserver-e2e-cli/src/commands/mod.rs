pub mod run;
pub mod secrets;
pub mod token;
