pub mod depth_image;
pub mod joint;
pub mod message;
pub mod vector;

pub use depth_image::{blank_depth_image, DepthImage};
pub use joint::Joint;
pub use message::{JointPositions, StateMessage, UserId};
pub use vector::Vec3;
