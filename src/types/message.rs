use super::{Joint, Vec3};

pub type UserId = u32;

/// One position per joint, indexed by [`Joint::index`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointPositions {
    positions: [Vec3; Joint::COUNT],
}

impl JointPositions {
    /// Queries every joint separately; `None` if any joint is unavailable.
    pub fn try_from_fn<F>(mut query: F) -> Option<Self>
    where
        F: FnMut(Joint) -> Option<Vec3>,
    {
        let mut positions = [Vec3::default(); Joint::COUNT];
        for joint in Joint::ALL {
            positions[joint.index()] = query(joint)?;
        }
        Some(Self { positions })
    }

    pub fn get(&self, joint: Joint) -> Vec3 {
        self.positions[joint.index()]
    }

    pub fn set(&mut self, joint: Joint, position: Vec3) {
        self.positions[joint.index()] = position;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, Vec3)> + '_ {
        Joint::ALL.iter().map(move |&joint| (joint, self.get(joint)))
    }
}

/// Skeleton snapshot of one tracked user, published on the state channel.
#[derive(Clone, Debug, PartialEq)]
pub struct StateMessage {
    pub timestamp: i64,
    pub user: UserId,
    pub points: JointPositions,
}

impl StateMessage {
    pub fn new(timestamp: i64, user: UserId, points: JointPositions) -> Self {
        Self {
            timestamp,
            user,
            points,
        }
    }
}
