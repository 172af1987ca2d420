pub mod hardware;
pub mod hash;
pub mod process;
