mod login;

pub use login::{LoginRequest, RegisterRequest};
