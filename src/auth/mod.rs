//! Session lifecycle: login, logout, register, refresh, profile update and
//! revalidation against the server.

mod service;
mod types;

pub use service::{
    AuthService, LOGIN_PATH, LOGOUT_PATH, ME_PATH, PROFILE_PATH, REFRESH_PATH, REGISTER_PATH,
};
pub use types::{Credentials, Registration};
