use glam::Vec3;

/// Distance on the ground plane; height is ignored.
pub(crate) fn planar_distance(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    (dx * dx + dz * dz).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Proximity {
    Near,
    Far,
}

impl Proximity {
    pub(crate) fn classify(distance: f32, threshold: f32) -> Self {
        if distance < threshold {
            Self::Near
        } else {
            Self::Far
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProximitySample {
    pub(crate) id: u32,
    pub(crate) distance: f32,
    pub(crate) proximity: Proximity,
}

pub(crate) fn sample_points<I>(agent: Vec3, points: I, threshold: f32) -> Vec<ProximitySample>
where
    I: IntoIterator<Item = (u32, Vec3)>,
{
    points
        .into_iter()
        .map(|(id, position)| {
            let distance = planar_distance(agent, position);
            ProximitySample {
                id,
                distance,
                proximity: Proximity::classify(distance, threshold),
            }
        })
        .collect()
}
