pub mod ownership;
pub mod password;
pub mod tokens;
