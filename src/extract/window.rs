//! Per-read candidate window and its state transitions.
//!
//! A window is anchored on one candidate position and holds `k` slots. Slot
//! `o` collects the current differences of the k-mer that starts `o` bases
//! before the anchor, so a forward-moving read fills the slots from `k - 1`
//! down to `0` and completes the window once its k-mers start past the anchor.

use crate::utils::Strand;

/// What the state machine needs to know about one filtered record.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    pub read_id: &'a str,
    pub position: usize,
    /// Offset of the first marker in the record's k-mer slice
    pub marker_offset: Option<usize>,
    pub strand: Strand,
    pub diff: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateWindow {
    read_id: String,
    anchor: usize,
    strand: Strand,
    slots: Vec<Vec<f64>>,
}

impl CandidateWindow {
    pub fn new(read_id: &str, anchor: usize, strand: Strand, k: usize) -> Self {
        Self {
            read_id: read_id.to_string(),
            anchor,
            strand,
            slots: vec![Vec::new(); k],
        }
    }

    pub fn read_id(&self) -> &str {
        &self.read_id
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn slots(&self) -> &[Vec<f64>] {
        &self.slots
    }

    pub fn k(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots that never received an observation.
    pub fn skips(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_empty()).count()
    }

    pub fn means(&self) -> Vec<f64> {
        self.slots
            .iter()
            .map(|slot| {
                if slot.is_empty() {
                    0.0
                } else {
                    slot.iter().sum::<f64>() / slot.len() as f64
                }
            })
            .collect()
    }

    /// Slot means in strand order followed by the read quality (`k` + 1 values).
    pub fn feature_vector(&self, quality: f64) -> Vec<f64> {
        let mut features = self.means();
        if self.strand == Strand::Reverse {
            features.reverse();
        }
        features.push(quality);
        features
    }

    fn record(&mut self, offset: usize, diff: f64) {
        self.slots[offset].push(diff);
    }

    /// Re-anchors on a later candidate, keeping the slots that still overlap.
    fn carried_to(&self, anchor: usize) -> Self {
        let k = self.k();
        let delta = anchor.saturating_sub(self.anchor).min(k);
        let mut slots = vec![Vec::new(); delta];
        slots.extend_from_slice(&self.slots[..k - delta]);
        Self {
            read_id: self.read_id.clone(),
            anchor,
            strand: self.strand,
            slots,
        }
    }

    fn is_passed_by(&self, step: &Step) -> bool {
        step.read_id != self.read_id || step.position > self.anchor
    }

    fn bridges_to(&self, step: &Step, skip_thresh: usize) -> bool {
        step.read_id == self.read_id
            && step.position <= self.anchor.saturating_add(skip_thresh).saturating_add(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum WindowState {
    #[default]
    Idle,
    Accumulating(CandidateWindow),
}

#[derive(Debug, Default)]
pub struct Transition {
    pub state: WindowState,
    /// Window the read moved past; to be flushed by the caller
    pub completed: Option<CandidateWindow>,
    /// The completed window's observations seeded the next candidate
    pub carried: bool,
    /// An open window was dropped without completing
    pub discarded: bool,
}

impl WindowState {
    pub fn window(&self) -> Option<&CandidateWindow> {
        match self {
            WindowState::Idle => None,
            WindowState::Accumulating(window) => Some(window),
        }
    }

    pub fn advance(self, step: &Step, k: usize, skip_thresh: usize) -> Transition {
        let mut transition = Transition::default();
        let candidate = |offset: usize| step.position.saturating_add(offset);

        let state = match self {
            WindowState::Accumulating(window) if window.is_passed_by(step) => {
                let next = match step.marker_offset {
                    Some(offset) if window.bridges_to(step, skip_thresh) => {
                        transition.carried = true;
                        WindowState::Accumulating(window.carried_to(candidate(offset)))
                    }
                    _ => WindowState::Idle,
                };
                transition.completed = Some(window);
                next
            }
            state => state,
        };

        transition.state = match (state, step.marker_offset) {
            (WindowState::Idle, None) => WindowState::Idle,
            (WindowState::Accumulating(_), None) => {
                transition.discarded = true;
                WindowState::Idle
            }
            (WindowState::Accumulating(mut window), Some(offset))
                if candidate(offset) == window.anchor =>
            {
                window.strand = step.strand;
                window.record(offset, step.diff);
                WindowState::Accumulating(window)
            }
            (state, Some(offset)) => {
                // a marker that disagrees with the open anchor restarts the window
                transition.discarded |= matches!(state, WindowState::Accumulating(_));
                let mut window =
                    CandidateWindow::new(step.read_id, candidate(offset), step.strand, k);
                window.record(offset, step.diff);
                WindowState::Accumulating(window)
            }
        };
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: usize = 3;

    fn step(read_id: &str, position: usize, marker_offset: Option<usize>, diff: f64) -> Step {
        Step {
            read_id,
            position,
            marker_offset,
            strand: Strand::Forward,
            diff,
        }
    }

    fn open(state: &WindowState) -> &CandidateWindow {
        state.window().expect("window should be open")
    }

    #[test]
    fn marker_opens_window_at_candidate() {
        let t = WindowState::Idle.advance(&step("r1", 10, Some(2), 1.5), K, 0);
        let window = open(&t.state);
        assert_eq!(window.anchor(), 12);
        assert_eq!(window.slots().len(), K);
        assert_eq!(window.slots()[2], vec![1.5]);
        assert!(t.completed.is_none());
    }

    #[test]
    fn no_marker_keeps_idle() {
        let t = WindowState::Idle.advance(&step("r1", 10, None, 1.0), K, 0);
        assert_eq!(t.state, WindowState::Idle);
        assert!(!t.discarded);
    }

    #[test]
    fn window_fills_and_completes_past_anchor() {
        let mut state = WindowState::Idle;
        for (pos, offset) in [(10, 2), (11, 1), (11, 1), (12, 0)] {
            let t = state.advance(&step("r1", pos, Some(offset), pos as f64), K, 0);
            assert!(t.completed.is_none());
            state = t.state;
        }
        assert_eq!(open(&state).skips(), 0);
        assert_eq!(open(&state).means(), vec![12.0, 11.0, 10.0]);

        let t = state.advance(&step("r1", 13, None, 0.0), K, 0);
        assert_eq!(t.state, WindowState::Idle);
        let done = t.completed.unwrap();
        assert_eq!(done.anchor(), 12);
        assert_eq!(done.skips(), 0);
        assert!(!t.carried);
    }

    #[test]
    fn read_switch_completes_window() {
        let t = WindowState::Idle.advance(&step("r1", 10, Some(2), 1.0), K, 0);
        let t = t.state.advance(&step("r2", 30, None, 1.0), K, 0);
        assert_eq!(t.state, WindowState::Idle);
        let done = t.completed.unwrap();
        assert_eq!(done.read_id(), "r1");
        assert_eq!(done.skips(), K - 1);
    }

    #[test]
    fn read_switch_with_marker_opens_fresh_window() {
        let t = WindowState::Idle.advance(&step("r1", 10, Some(2), 1.0), K, 0);
        let t = t.state.advance(&step("r2", 11, Some(1), 2.0), K, 0);
        assert!(t.completed.is_some());
        let window = open(&t.state);
        assert_eq!(window.read_id(), "r2");
        assert_eq!(window.slots()[2], Vec::<f64>::new());
        assert_eq!(window.slots()[1], vec![2.0]);
    }

    #[test]
    fn adjacent_candidate_carries_overlap() {
        // candidates at 12 and 13
        let mut state = WindowState::Idle;
        for (pos, offset, diff) in [(10, 2, 1.0), (11, 1, 2.0), (12, 0, 3.0)] {
            state = state.advance(&step("r1", pos, Some(offset), diff), K, 0).state;
        }
        let t = state.advance(&step("r1", 13, Some(0), 4.0), K, 0);
        assert!(t.carried);
        assert_eq!(t.completed.unwrap().means(), vec![3.0, 2.0, 1.0]);
        let window = open(&t.state);
        assert_eq!(window.anchor(), 13);
        assert_eq!(window.slots().len(), K);
        assert_eq!(window.slots()[0], vec![4.0]);
        assert_eq!(window.slots()[1], vec![3.0]);
        assert_eq!(window.slots()[2], vec![2.0]);
    }

    #[test]
    fn carry_requires_bridgeable_gap() {
        let t = WindowState::Idle.advance(&step("r1", 12, Some(0), 1.0), K, 0);
        // jumped two bases past the anchor with skip_thresh 0
        let t = t.state.advance(&step("r1", 14, Some(0), 2.0), K, 0);
        assert!(!t.carried);
        let window = open(&t.state);
        assert_eq!(window.anchor(), 14);
        assert_eq!(window.skips(), K - 1);

        let t = WindowState::Idle.advance(&step("r1", 12, Some(0), 1.0), K, 1);
        let t = t.state.advance(&step("r1", 14, Some(0), 2.0), K, 1);
        assert!(t.carried);
        assert_eq!(open(&t.state).slots()[2], vec![1.0]);
    }

    #[test]
    fn missing_marker_discards_open_window() {
        let t = WindowState::Idle.advance(&step("r1", 10, Some(2), 1.0), K, 0);
        let t = t.state.advance(&step("r1", 11, None, 1.0), K, 0);
        assert_eq!(t.state, WindowState::Idle);
        assert!(t.completed.is_none());
        assert!(t.discarded);
    }

    #[test]
    fn disagreeing_marker_restarts_window() {
        let t = WindowState::Idle.advance(&step("r1", 10, Some(2), 1.0), K, 0);
        // same read, not yet past anchor 12, but the marker points at 13
        let t = t.state.advance(&step("r1", 11, Some(2), 5.0), K, 0);
        assert!(t.discarded);
        assert!(t.completed.is_none());
        assert!(!t.carried);
        let window = open(&t.state);
        assert_eq!(window.anchor(), 13);
        assert_eq!(window.skips(), K - 1);
        assert_eq!(window.slots()[2], vec![5.0]);
    }

    #[test]
    fn positions_near_usize_max_do_not_overflow() {
        let t = WindowState::Idle.advance(&step("r1", usize::MAX - 1, Some(2), 1.0), K, usize::MAX);
        assert_eq!(open(&t.state).anchor(), usize::MAX);
        let t = t.state.advance(&step("r1", usize::MAX, Some(1), 2.0), K, usize::MAX);
        assert!(!t.discarded);
        assert_eq!(open(&t.state).slots()[1], vec![2.0]);
    }

    #[test]
    fn reverse_window_orients_features() {
        let mut window = CandidateWindow::new("r1", 12, Strand::Reverse, K);
        window.record(0, 1.0);
        window.record(2, 3.0);
        window.record(2, 5.0);
        assert_eq!(window.means(), vec![1.0, 0.0, 4.0]);
        assert_eq!(window.feature_vector(20.0), vec![4.0, 0.0, 1.0, 20.0]);
        window.strand = Strand::Forward;
        assert_eq!(window.feature_vector(20.0), vec![1.0, 0.0, 4.0, 20.0]);
    }

    #[test]
    fn carried_window_beyond_k_is_empty() {
        let mut window = CandidateWindow::new("r1", 12, Strand::Forward, K);
        window.record(0, 1.0);
        let carried = window.carried_to(20);
        assert_eq!(carried.k(), K);
        assert_eq!(carried.skips(), K);
    }
}
