use std::fmt::Write as _;

use base64::{engine::general_purpose, Engine as _};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::PublishError;
use crate::config::{ImageEncoding, PointEncoding, PublishConfig};
use crate::types::{DepthImage, JointPositions, StateMessage};

/// Turns state messages and depth frames into broker payloads.
#[derive(Debug, Clone, Copy)]
pub struct PayloadEncoder {
    pub point_encoding: PointEncoding,
    pub image_encoding: ImageEncoding,
    pub include_user_id: bool,
}

impl PayloadEncoder {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            point_encoding: config.point_encoding,
            image_encoding: config.image_encoding,
            include_user_id: config.include_user_id,
        }
    }

    /// `{"timestamp": <ms>, "points": {"head": .., ..}}`
    pub fn encode_state(&self, message: &StateMessage) -> Result<Vec<u8>, PublishError> {
        let payload = StatePayload {
            encoder: self,
            message,
        };
        Ok(serde_json::to_vec(&payload)?)
    }

    pub fn encode_image(&self, image: &DepthImage) -> Vec<u8> {
        match self.image_encoding {
            ImageEncoding::PixelArray => pixel_array(image).into_bytes(),
            ImageEncoding::Base64 => {
                let bytes: Vec<u8> = image.as_raw().iter().flat_map(|d| d.to_le_bytes()).collect();
                general_purpose::STANDARD.encode(bytes).into_bytes()
            }
        }
    }
}

/// `[p0, p1, ...]`
fn pixel_array(image: &DepthImage) -> String {
    let raw = image.as_raw();
    let mut out = String::with_capacity(raw.len() * 6 + 2);
    out.push('[');
    for (i, depth) in raw.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", depth);
    }
    out.push(']');
    out
}

struct StatePayload<'a> {
    encoder: &'a PayloadEncoder,
    message: &'a StateMessage,
}

impl Serialize for StatePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.encoder.include_user_id { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("timestamp", &self.message.timestamp)?;
        if self.encoder.include_user_id {
            map.serialize_entry("user", &self.message.user)?;
        }
        map.serialize_entry(
            "points",
            &PointsPayload {
                encoding: self.encoder.point_encoding,
                points: &self.message.points,
            },
        )?;
        map.end()
    }
}

struct PointsPayload<'a> {
    encoding: PointEncoding,
    points: &'a JointPositions,
}

impl Serialize for PointsPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(crate::types::Joint::COUNT))?;
        for (joint, position) in self.points.iter() {
            match self.encoding {
                PointEncoding::VectorString => map.serialize_entry(joint.name(), &position.to_string())?,
                PointEncoding::Object => map.serialize_entry(joint.name(), &position)?,
            }
        }
        map.end()
    }
}
