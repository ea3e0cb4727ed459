//! Rejection of neighbors that do not look like the center pixel

use super::settings::NeighborSimilarity;
use crate::shading::Surface;

/// The neighbor lies close to the tangent plane of the center
#[must_use]
pub fn plane_distance_similar(center: &Surface, neighbor: &Surface, threshold: f64) -> bool {
    (neighbor.position - center.position)
        .dot(center.geometric_normal)
        .abs()
        < threshold
}

/// The shading normals are at most `angle_degrees` apart
#[must_use]
pub fn normal_similar(center: &Surface, neighbor: &Surface, angle_degrees: f64) -> bool {
    center.shading_normal.dot(neighbor.shading_normal) >= angle_degrees.to_radians().cos()
}

#[must_use]
pub fn roughness_similar(center: &Surface, neighbor: &Surface, threshold: f64) -> bool {
    (center.roughness() - neighbor.roughness()).abs() <= threshold
}

/// Runs every enabled heuristic of `similarity`
#[must_use]
pub fn neighbor_similar(
    similarity: &NeighborSimilarity,
    center: &Surface,
    neighbor: &Surface,
) -> bool {
    (!similarity.use_plane_distance
        || plane_distance_similar(center, neighbor, similarity.plane_distance_threshold))
        && (!similarity.use_normal
            || normal_similar(center, neighbor, similarity.normal_angle_degrees))
        && (!similarity.use_roughness
            || roughness_similar(center, neighbor, similarity.roughness_threshold))
}
