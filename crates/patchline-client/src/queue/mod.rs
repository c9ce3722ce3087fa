//! Message queues crossing the application/callback boundary.

pub(crate) mod receive;
pub(crate) mod send;
