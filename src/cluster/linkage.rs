//! Agglomerative hierarchical clustering with average linkage.
use itertools::Itertools;

/// Manhattan distance between two vectors of the same length
pub fn cityblock(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Group `points` into `k` flat clusters by average-linkage agglomeration on cityblock distance.
///
/// The two closest clusters are merged until `k` remain. Ties are broken by the lowest pair of
/// indices, so the result depends only on the input. Returns a label in `0..k` for each point;
/// clusters are labelled in order of their first member.
pub fn average_linkage(points: &[Vec<f64>], k: usize) -> Vec<usize> {
    let n = points.len();
    let k = k.clamp(1, n.max(1));

    let mut distance: Vec<Vec<f64>> = points
        .iter()
        .map(|a| points.iter().map(|b| cityblock(a, b)).collect())
        .collect();
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let mut active = n;

    while active > k {
        let Some((i, j)) = closest_pair(&distance, &members) else {
            break;
        };
        let (size_i, size_j) = (cluster_size(&members, i), cluster_size(&members, j));

        // Lance-Williams update for average linkage
        for c in 0..n {
            if c == i || c == j || members[c].is_none() {
                continue;
            }
            let merged = (size_i * distance[i][c] + size_j * distance[j][c]) / (size_i + size_j);
            distance[i][c] = merged;
            distance[c][i] = merged;
        }

        let absorbed = members[j].take().unwrap_or_default();
        if let Some(cluster) = members[i].as_mut() {
            cluster.extend(absorbed);
        }
        active -= 1;
    }

    let mut labels = vec![0; n];
    for (label, cluster) in members.iter().flatten().enumerate() {
        for &point in cluster {
            labels[point] = label;
        }
    }

    labels
}

fn cluster_size(members: &[Option<Vec<usize>>], idx: usize) -> f64 {
    members[idx].as_ref().map_or(0, Vec::len) as f64
}

/// The pair of active clusters with the smallest distance, lowest indices first on ties
fn closest_pair(distance: &[Vec<f64>], members: &[Option<Vec<usize>>]) -> Option<(usize, usize)> {
    let active = members
        .iter()
        .enumerate()
        .filter(|(_, cluster)| cluster.is_some())
        .map(|(idx, _)| idx);

    let mut best: Option<(usize, usize, f64)> = None;
    for (i, j) in active.tuple_combinations() {
        let d = distance[i][j];
        if best.is_none_or(|(_, _, best_d)| d < best_d) {
            best = Some((i, j, d));
        }
    }

    best.map(|(i, j, _)| (i, j))
}
