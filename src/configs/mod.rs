pub mod ambient;
pub mod base;
pub mod logging;
pub mod server;
pub mod session;

pub use ambient::*;
pub use base::*;
pub use logging::*;
pub use server::*;
pub use session::*;
