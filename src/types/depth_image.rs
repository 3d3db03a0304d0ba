use image::{ImageBuffer, Luma};

/// 16 位深度图, 每个像素为距离 (毫米), 0 表示无效
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

pub fn blank_depth_image(width: u32, height: u32) -> DepthImage {
    ImageBuffer::from_pixel(width, height, Luma([0u16]))
}
