use glam::Vec2;

use super::NodeIndex;

/// For every point, the indices of its `k` nearest other points, closest first.
///
/// Equal distances keep creation order (the sort is stable). Lists are
/// `min(k, len - 1)` long and never contain the point itself.
pub fn nearest_neighbors(positions: &[Vec2], k: usize) -> Vec<Vec<NodeIndex>> {
    positions
        .iter()
        .enumerate()
        .map(|(index, origin)| {
            let mut candidates: Vec<(NodeIndex, f32)> = positions
                .iter()
                .enumerate()
                .filter(|&(other, _)| other != index)
                .map(|(other, position)| (other, origin.distance(*position)))
                .collect();

            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
            candidates.into_iter().take(k).map(|(other, _)| other).collect()
        })
        .collect()
}
