pub mod prelude;

pub mod media;
pub mod users;
