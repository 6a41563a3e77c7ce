pub mod generations;
pub mod health;
