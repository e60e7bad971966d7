pub(crate) mod admin;
pub(crate) mod investigate;
pub(crate) mod session;
