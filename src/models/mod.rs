pub mod credential;
pub mod verification;
