/// Kernel initialization and bootstrap module
pub mod init;

pub use init::init_kernel;
