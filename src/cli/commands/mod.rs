pub mod health;
pub mod migrate;
pub mod system;
pub mod term;
pub mod token;
