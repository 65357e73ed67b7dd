pub mod bootstrap;
pub mod day2;
pub mod discovery;
pub mod documents;
