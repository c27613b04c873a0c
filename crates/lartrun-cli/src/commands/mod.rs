pub(crate) mod classify;
pub(crate) mod explore;
pub(crate) mod helpers;
pub(crate) mod verify;
