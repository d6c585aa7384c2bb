pub mod director;
pub mod managers;
pub mod transport;

pub use director::*;
pub use managers::*;
pub use transport::*;
