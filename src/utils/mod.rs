pub mod logging;
pub mod natural_sort;

pub use logging::init_logging;
pub use natural_sort::{natural_cmp, natural_sort};
