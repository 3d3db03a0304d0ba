pub mod runner;

pub use runner::FrameLoop;
