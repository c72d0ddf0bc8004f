/// Playback-progress percentage that triggers a one-time progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Milestone {
    Quarter,
    Half,
    ThreeQuarters,
    Complete,
}

impl Milestone {
    /// All milestones in ascending order.
    pub const ALL: [Milestone; 4] = [
        Milestone::Quarter,
        Milestone::Half,
        Milestone::ThreeQuarters,
        Milestone::Complete,
    ];

    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            Self::Quarter => 25,
            Self::Half => 50,
            Self::ThreeQuarters => 75,
            Self::Complete => 100,
        }
    }

    /// Position in seconds at which this milestone is reached for a video of
    /// the given duration.
    #[must_use]
    pub fn threshold(self, duration_secs: f64) -> f64 {
        f64::from(self.percent()) / 100.0 * duration_secs
    }

    fn bit(self) -> u8 {
        match self {
            Self::Quarter => 0b0001,
            Self::Half => 0b0010,
            Self::ThreeQuarters => 0b0100,
            Self::Complete => 0b1000,
        }
    }
}

/// Set of milestones already reported during a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MilestoneSet(u8);

impl MilestoneSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a milestone as reached. Returns `true` only the first time.
    pub fn insert(&mut self, milestone: Milestone) -> bool {
        let fresh = !self.contains(milestone);
        self.0 |= milestone.bit();
        fresh
    }

    #[must_use]
    pub fn contains(&self, milestone: Milestone) -> bool {
        self.0 & milestone.bit() != 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Milestone> + '_ {
        Milestone::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_first_time_only() {
        let mut set = MilestoneSet::new();
        assert!(set.insert(Milestone::Half));
        assert!(!set.insert(Milestone::Half));
        assert!(set.contains(Milestone::Half));
        assert!(!set.contains(Milestone::Quarter));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn iter_is_ascending() {
        let mut set = MilestoneSet::new();
        set.insert(Milestone::Complete);
        set.insert(Milestone::Quarter);
        let percents: Vec<u8> = set.iter().map(Milestone::percent).collect();
        assert_eq!(percents, vec![25, 100]);
    }

    #[test]
    fn thresholds_scale_with_duration() {
        assert_eq!(Milestone::Quarter.threshold(100.0), 25.0);
        assert_eq!(Milestone::Complete.threshold(80.0), 80.0);
    }
}
