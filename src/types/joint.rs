use std::fmt;

/// Skeleton joints reported by the tracker, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Joint {
    Head,
    Neck,
    LeftShoulder,
    LeftElbow,
    LeftHand,
    RightShoulder,
    RightElbow,
    RightHand,
    Torso,
    LeftHip,
    LeftKnee,
    LeftFoot,
    RightHip,
    RightKnee,
    RightFoot,
}

impl Joint {
    pub const COUNT: usize = 15;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Head,
        Joint::Neck,
        Joint::LeftShoulder,
        Joint::LeftElbow,
        Joint::LeftHand,
        Joint::RightShoulder,
        Joint::RightElbow,
        Joint::RightHand,
        Joint::Torso,
        Joint::LeftHip,
        Joint::LeftKnee,
        Joint::LeftFoot,
        Joint::RightHip,
        Joint::RightKnee,
        Joint::RightFoot,
    ];

    /// 骨架连线 (起点, 终点)
    pub const LIMBS: [(Joint, Joint); 15] = [
        (Joint::Head, Joint::Neck),
        (Joint::Neck, Joint::LeftShoulder),
        (Joint::LeftShoulder, Joint::LeftElbow),
        (Joint::LeftElbow, Joint::LeftHand),
        (Joint::Neck, Joint::RightShoulder),
        (Joint::RightShoulder, Joint::RightElbow),
        (Joint::RightElbow, Joint::RightHand),
        (Joint::LeftShoulder, Joint::Torso),
        (Joint::RightShoulder, Joint::Torso),
        (Joint::Torso, Joint::LeftHip),
        (Joint::LeftHip, Joint::LeftKnee),
        (Joint::LeftKnee, Joint::LeftFoot),
        (Joint::Torso, Joint::RightHip),
        (Joint::RightHip, Joint::RightKnee),
        (Joint::RightKnee, Joint::RightFoot),
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Joint::Head => "head",
            Joint::Neck => "neck",
            Joint::LeftShoulder => "left_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::LeftHand => "left_hand",
            Joint::RightShoulder => "right_shoulder",
            Joint::RightElbow => "right_elbow",
            Joint::RightHand => "right_hand",
            Joint::Torso => "torso",
            Joint::LeftHip => "left_hip",
            Joint::LeftKnee => "left_knee",
            Joint::LeftFoot => "left_foot",
            Joint::RightHip => "right_hip",
            Joint::RightKnee => "right_knee",
            Joint::RightFoot => "right_foot",
        }
    }

    pub fn from_name(name: &str) -> Option<Joint> {
        Joint::ALL.iter().copied().find(|joint| joint.name() == name)
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for Joint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Joint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Joint::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown joint: {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_joints_are_distinct_and_indexed_in_order() {
        let names: HashSet<&str> = Joint::ALL.iter().map(|j| j.name()).collect();
        assert_eq!(names.len(), Joint::COUNT);
        for (i, joint) in Joint::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
        }
    }

    #[test]
    fn names_resolve_back_to_joints() {
        for joint in Joint::ALL {
            assert_eq!(Joint::from_name(joint.name()), Some(joint));
        }
        assert_eq!(Joint::from_name("left_wrist"), None);
    }

    #[test]
    fn every_joint_is_reached_by_a_limb() {
        let covered: HashSet<Joint> = Joint::LIMBS
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .collect();
        assert_eq!(covered.len(), Joint::COUNT);
    }

    #[test]
    fn deserializes_from_wire_name() {
        let joint: Joint = serde_json::from_str("\"right_knee\"").unwrap();
        assert_eq!(joint, Joint::RightKnee);
        assert!(serde_json::from_str::<Joint>("\"tail\"").is_err());
    }
}
