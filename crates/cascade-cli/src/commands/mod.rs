pub mod islands;
pub mod run;
pub mod sweep;
pub mod util;
pub mod validate;
