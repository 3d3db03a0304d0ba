use image::Luma;

use super::{project_to_image, DEPTH_FOCAL_LENGTH};
use crate::types::{DepthImage, Joint, JointPositions, Vec3};

/// 背景平面深度 (毫米)
pub const BACKGROUND_DEPTH_MM: u16 = 4000;
/// Joints closer than this are outside the sensor's working range and are not drawn.
pub const MIN_DEPTH_MM: f32 = 400.0;
const LIMB_WIDTH_MM: f32 = 120.0;
const HEAD_DIAMETER_MM: f32 = 200.0;

/// Redraws `image` as a flat background with each skeleton's limbs stamped in.
pub fn render_depth<'a, I>(image: &mut DepthImage, skeletons: I)
where
    I: IntoIterator<Item = &'a JointPositions>,
{
    for pixel in image.pixels_mut() {
        *pixel = Luma([BACKGROUND_DEPTH_MM]);
    }

    for skeleton in skeletons {
        for (a, b) in Joint::LIMBS {
            stamp_limb(image, skeleton, a, b);
        }
        let head = skeleton.get(Joint::Head);
        if let Some((u, v)) = drawable(head, image) {
            let radius = disc_radius(image, head.z, HEAD_DIAMETER_MM);
            stamp_disc(image, u, v, radius, head.z);
        }
    }
}

/// Image position of a joint, or `None` when it is out of range or not finite.
fn drawable(point: Vec3, image: &DepthImage) -> Option<(f32, f32)> {
    let finite = point.x.is_finite() && point.y.is_finite() && point.z.is_finite();
    if !finite || point.z < MIN_DEPTH_MM {
        return None;
    }
    let (u, v) = project_to_image(point, image.width(), image.height())?;
    (u.is_finite() && v.is_finite()).then_some((u, v))
}

fn disc_radius(image: &DepthImage, z: f32, diameter_mm: f32) -> f32 {
    let (width, height) = image.dimensions();
    let diagonal = (width as f32).hypot(height as f32);
    (DEPTH_FOCAL_LENGTH / z * diameter_mm / 2.0).min(diagonal)
}

fn stamp_limb(image: &mut DepthImage, skeleton: &JointPositions, a: Joint, b: Joint) {
    let (width, height) = image.dimensions();
    let pa = skeleton.get(a);
    let pb = skeleton.get(b);
    let (Some((ua, va)), Some((ub, vb))) = (drawable(pa, image), drawable(pb, image)) else {
        return;
    };

    // 只处理落在图像 (含笔宽) 内的那一段
    let margin = disc_radius(image, pa.z.min(pb.z), LIMB_WIDTH_MM);
    let Some((t0, t1)) = clip_segment(
        (ua, va),
        (ub, vb),
        (-margin, -margin),
        (width as f32 + margin, height as f32 + margin),
    ) else {
        return;
    };

    let span = ((ub - ua) * (t1 - t0)).abs().max(((vb - va) * (t1 - t0)).abs());
    let max_steps = (width + height) as f32;
    let steps = span.ceil().clamp(1.0, max_steps) as usize;
    for i in 0..=steps {
        let t = t0 + (t1 - t0) * i as f32 / steps as f32;
        let z = pa.z + (pb.z - pa.z) * t;
        let radius = disc_radius(image, z, LIMB_WIDTH_MM);
        stamp_disc(image, ua + (ub - ua) * t, va + (vb - va) * t, radius, z);
    }
}

/// Liang-Barsky clip of the segment `a -> b` against the box `min..max`.
/// Returns the parameter range `(t0, t1)` of the visible part.
fn clip_segment(a: (f32, f32), b: (f32, f32), min: (f32, f32), max: (f32, f32)) -> Option<(f32, f32)> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let mut t0 = 0.0_f32;
    let mut t1 = 1.0_f32;

    for (p, q) in [
        (-dx, a.0 - min.0),
        (dx, max.0 - a.0),
        (-dy, a.1 - min.1),
        (dy, max.1 - a.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

fn stamp_disc(image: &mut DepthImage, cx: f32, cy: f32, radius: f32, depth_mm: f32) {
    let (width, height) = image.dimensions();
    let depth = depth_mm.clamp(1.0, u16::MAX as f32) as u16;
    let r = radius.max(0.5);
    let x0 = (cx - r).floor().max(0.0) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let x1 = ((cx + r).ceil().max(0.0) as u32).min(width);
    let y1 = ((cy + r).ceil().max(0.0) as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let pixel = image.get_pixel_mut(x, y);
            // 近处覆盖远处
            if depth < pixel.0[0] {
                pixel.0[0] = depth;
            }
        }
    }
}
