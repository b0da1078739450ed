//! OPTICS ordering and xi-steep cluster extraction.
//!
//! The ordering visits at each step the unprocessed sample of smallest reachability and updates
//! the reachability of the others through the core distance of the visited sample, keeping
//! track of predecessors.
//! Clusters are then extracted from the reachability plot : a cluster starts in a steep down
//! area and ends in a steep up area, a point is steep when the ratio of reachability with its
//! successor crosses 1 - xi. Samples in no cluster are noise, labelled -1.

use ndarray::{Array2, ArrayView2};

use crate::cluster::linalg::pairwise_distances;
use crate::cluster::ClustererT;
use crate::errors::StudyError;

/// result of the ordering phase
#[derive(Clone, Debug)]
pub struct OpticsGraph {
    pub ordering: Vec<usize>,
    pub core_distances: Vec<f64>,
    pub reachability: Vec<f64>,
    /// -1 for samples reached from nothing
    pub predecessor: Vec<i64>,
}

// a steep down area
#[derive(Clone, Debug)]
struct SteepDownArea {
    start: usize,
    end: usize,
    mib: f64,
}

#[derive(Clone, Debug)]
pub struct Optics {
    min_samples: usize,
    xi: f64,
    min_cluster_size: usize,
    predecessor_correction: bool,
}

impl Optics {
    pub fn new(min_samples: usize) -> Self {
        Optics { min_samples, xi: 0.05, min_cluster_size: min_samples, predecessor_correction: true }
    }

    pub fn compute_graph(&self, dist: &Array2<f64>) -> OpticsGraph {
        let n = dist.nrows();
        let core_distances: Vec<f64> = dist
            .rows()
            .into_iter()
            .map(|row| {
                let mut d = row.to_vec();
                d.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                d[self.min_samples - 1]
            })
            .collect();
        let mut reachability = vec![f64::INFINITY; n];
        let mut predecessor = vec![-1i64; n];
        let mut processed = vec![false; n];
        let mut ordering = Vec::<usize>::with_capacity(n);
        for _ in 0..n {
            // smallest reachability among unprocessed, first one on ties
            let mut point = usize::MAX;
            for i in 0..n {
                if !processed[i] && (point == usize::MAX || reachability[i] < reachability[point]) {
                    point = i;
                }
            }
            processed[point] = true;
            ordering.push(point);
            if core_distances[point].is_finite() {
                for j in 0..n {
                    if processed[j] {
                        continue;
                    }
                    let rdist = dist[[point, j]].max(core_distances[point]);
                    if rdist < reachability[j] {
                        reachability[j] = rdist;
                        predecessor[j] = point as i64;
                    }
                }
            }
        }
        OpticsGraph { ordering, core_distances, reachability, predecessor }
    } // end of compute_graph

    /// clusters as ranges [start, end] in the ordering, smaller ones first
    pub fn xi_clusters(&self, graph: &OpticsGraph) -> Vec<(usize, usize)> {
        let n = graph.ordering.len();
        let mut plot: Vec<f64> = graph.ordering.iter().map(|i| graph.reachability[*i]).collect();
        plot.push(f64::INFINITY);
        let pred_plot: Vec<i64> = graph.ordering.iter().map(|i| graph.predecessor[*i]).collect();
        let xi_complement = 1. - self.xi;
        // comparisons with NaN ratios are false
        let ratio: Vec<f64> = (0..n).map(|i| plot[i] / plot[i + 1]).collect();
        let steep_upward: Vec<bool> = ratio.iter().map(|r| *r <= xi_complement).collect();
        let steep_downward: Vec<bool> = ratio.iter().map(|r| *r >= 1. / xi_complement).collect();
        let downward: Vec<bool> = ratio.iter().map(|r| *r > 1.).collect();
        let upward: Vec<bool> = ratio.iter().map(|r| *r < 1.).collect();
        //
        let mut sdas = Vec::<SteepDownArea>::new();
        let mut clusters = Vec::<(usize, usize)>::new();
        let mut index = 0usize;
        let mut mib = 0f64;
        for steep_index in 0..n {
            if !(steep_upward[steep_index] || steep_downward[steep_index]) || steep_index < index {
                continue;
            }
            mib = plot[index..=steep_index].iter().cloned().fold(mib, f64::max);
            sdas = Self::update_filter_sdas(sdas, mib, xi_complement, &plot);
            if steep_downward[steep_index] {
                let d_end = self.extend_region(&steep_downward, &upward, steep_index);
                sdas.push(SteepDownArea { start: steep_index, end: d_end, mib: 0. });
                index = d_end + 1;
                mib = plot[index];
            } else {
                let u_start = steep_index;
                let u_end = self.extend_region(&steep_upward, &downward, u_start);
                index = u_end + 1;
                mib = plot[index];
                let mut u_clusters = Vec::<(usize, usize)>::new();
                for d in &sdas {
                    let mut c_start = d.start;
                    let mut c_end = u_end;
                    if plot[c_end + 1] * xi_complement < d.mib {
                        continue;
                    }
                    let d_max = plot[d.start];
                    if d_max * xi_complement >= plot[c_end + 1] {
                        while plot[c_start + 1] > plot[c_end + 1] && c_start < d.end {
                            c_start += 1;
                        }
                    } else if plot[c_end + 1] * xi_complement >= d_max {
                        while c_end > u_start && plot[c_end - 1] > d_max {
                            c_end -= 1;
                        }
                    }
                    if self.predecessor_correction {
                        match Self::correct_predecessor(&plot, &pred_plot, &graph.ordering, c_start, c_end) {
                            Some((s, e)) => {
                                c_start = s;
                                c_end = e;
                            }
                            None => continue,
                        }
                    }
                    if c_end + 1 - c_start < self.min_cluster_size {
                        continue;
                    }
                    if c_start > d.end || c_end < u_start {
                        continue;
                    }
                    u_clusters.push((c_start, c_end));
                }
                u_clusters.reverse();
                clusters.extend(u_clusters);
            }
        }
        clusters
    } // end of xi_clusters

    fn update_filter_sdas(sdas: Vec<SteepDownArea>, mib: f64, xi_complement: f64, plot: &[f64]) -> Vec<SteepDownArea> {
        if mib.is_infinite() {
            return Vec::new();
        }
        sdas.into_iter()
            .filter(|sda| mib <= plot[sda.start] * xi_complement)
            .map(|mut sda| {
                sda.mib = sda.mib.max(mib);
                sda
            })
            .collect()
    }

    // extends a steep region while non xward points are at most min_samples consecutive ones
    fn extend_region(&self, steep: &[bool], xward: &[bool], start: usize) -> usize {
        let mut non_xward = 0;
        let mut end = start;
        for index in start..steep.len() {
            if steep[index] {
                non_xward = 0;
                end = index;
            } else if !xward[index] {
                non_xward += 1;
                if non_xward > self.min_samples {
                    break;
                }
            } else {
                return end;
            }
        }
        end
    }

    fn correct_predecessor(plot: &[f64], pred_plot: &[i64], ordering: &[usize], s: usize, mut e: usize) -> Option<(usize, usize)> {
        while s < e {
            if plot[s] > plot[e] {
                return Some((s, e));
            }
            let p_e = pred_plot[e];
            if (s..e).any(|i| p_e == ordering[i] as i64) {
                return Some((s, e));
            }
            e -= 1;
        }
        None
    }

    /// labels from clusters, a cluster overlapping an already labelled one is dropped
    pub fn extract_labels(ordering: &[usize], clusters: &[(usize, usize)]) -> Vec<i64> {
        let mut plot_labels = vec![-1i64; ordering.len()];
        let mut label = 0;
        for (start, end) in clusters {
            if plot_labels[*start..=*end].iter().all(|l| *l == -1) {
                plot_labels[*start..=*end].iter_mut().for_each(|l| *l = label);
                label += 1;
            }
        }
        let mut labels = vec![-1i64; ordering.len()];
        for (rank, sample) in ordering.iter().enumerate() {
            labels[*sample] = plot_labels[rank];
        }
        labels
    }
} // end of impl Optics

impl ClustererT for Optics {
    fn cluster(&self, data: &ArrayView2<f64>) -> anyhow::Result<Vec<i64>> {
        let n = data.nrows();
        if self.min_samples < 2 {
            return Err(StudyError::clustering(format!("optics min_samples must be at least 2, got {}", self.min_samples)).into());
        }
        if n < self.min_samples {
            return Err(StudyError::clustering(format!("optics needs at least min_samples = {} samples, got {}", self.min_samples, n)).into());
        }
        let dist = pairwise_distances(data);
        let graph = self.compute_graph(&dist);
        let clusters = self.xi_clusters(&graph);
        log::debug!("optics found {} clusters", clusters.len());
        Ok(Self::extract_labels(&graph.ordering, &clusters))
    }
}

// end of mod tests
