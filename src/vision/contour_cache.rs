//! Visited-candidate set shared across edge parameter sweeps
//!
//! The same physical outline is found again and again as the edge thresholds
//! change. Candidates are keyed by their oriented box and the search angle so
//! each distinct outline is classified once per angle.

use std::collections::HashSet;

use super::contours::OrientedBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CandidateKey {
    center_x: u32,
    center_y: u32,
    width: u32,
    height: u32,
    box_angle: u32,
    search_angle: u64,
}

impl CandidateKey {
    fn new(oriented: &OrientedBox, search_angle: f64) -> Self {
        // +0.0 and -0.0 must hash alike
        let bits32 = |v: f32| if v == 0.0 { 0 } else { v.to_bits() };
        let bits64 = |v: f64| if v == 0.0 { 0 } else { v.to_bits() };

        Self {
            center_x: bits32(oriented.center.0),
            center_y: bits32(oriented.center.1),
            width: bits32(oriented.width),
            height: bits32(oriented.height),
            box_angle: bits32(oriented.angle),
            search_angle: bits64(search_angle),
        }
    }
}

/// Set of (oriented box, search angle) pairs already examined
#[derive(Debug, Default)]
pub struct ContourCache {
    seen: HashSet<CandidateKey>,
}

impl ContourCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, oriented: &OrientedBox, angle: f64) -> bool {
        self.seen.contains(&CandidateKey::new(oriented, angle))
    }

    pub fn add(&mut self, oriented: &OrientedBox, angle: f64) {
        self.seen.insert(CandidateKey::new(oriented, angle));
    }

    /// Mark a candidate visited; returns false if it had been seen already
    pub fn insert(&mut self, oriented: &OrientedBox, angle: f64) -> bool {
        self.seen.insert(CandidateKey::new(oriented, angle))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
