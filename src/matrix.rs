use crate::config::CampaignConfig;
use crate::logname::{CellLogName, DateId, Sweep};

/// One run of the subject under a fixed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCell {
    pub mode: String,
    pub associations: u32,
    /// Only set during the tree depth sweep
    pub tree_depth: Option<u32>,
    /// 0-based index among the repeats of the same cell
    pub repeat: u32,
}

impl TestCell {
    pub fn sweep(&self) -> Sweep {
        match self.tree_depth {
            Some(_) => Sweep::TreeDepth,
            None => Sweep::Associations,
        }
    }

    /// Value the log file is keyed by: the depth when sweeping depths,
    /// otherwise the association count
    pub fn sweep_value(&self) -> u32 {
        self.tree_depth.unwrap_or(self.associations)
    }

    /// Log file this cell appends to. All repeats of a cell share it.
    pub fn log_name(&self, date: &DateId) -> CellLogName {
        CellLogName {
            date: date.clone(),
            mode: self.mode.clone(),
            sweep: self.sweep(),
            number: self.sweep_value(),
        }
    }
}

/// Derives the ordered test cell sequence from a campaign config.
///
/// Modes run in lexicographic order. Each mode sweeps the association list
/// in declared order, and the tree sweep mode follows its association sweep
/// with a depth sweep at a fixed association count. Every cell is repeated
/// `repeats` times back to back.
pub struct MatrixEnumerator<'a> {
    config: &'a CampaignConfig,
}

impl<'a> MatrixEnumerator<'a> {
    pub fn new(config: &'a CampaignConfig) -> Self {
        Self { config }
    }

    pub fn cells(&self) -> Vec<TestCell> {
        let mut cells = Vec::with_capacity(self.len());

        // BTreeMap keys iterate sorted
        for mode in self.config.modes.keys() {
            for &associations in &self.config.associations {
                self.push_repeats(&mut cells, mode, associations, None);
            }

            if self.config.tree_sweep_enabled(mode) {
                for &depth in &self.config.tree_depths {
                    self.push_repeats(
                        &mut cells,
                        mode,
                        self.config.tree_associations,
                        Some(depth),
                    );
                }
            }
        }

        cells
    }

    /// Number of cells `cells()` yields
    pub fn len(&self) -> usize {
        let per_mode = self.config.associations.len() * self.config.repeats as usize;
        let tree = self
            .config
            .modes
            .keys()
            .filter(|mode| self.config.tree_sweep_enabled(mode))
            .count()
            * self.config.tree_depths.len()
            * self.config.repeats as usize;
        self.config.modes.len() * per_mode + tree
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_repeats(
        &self,
        cells: &mut Vec<TestCell>,
        mode: &str,
        associations: u32,
        tree_depth: Option<u32>,
    ) {
        for repeat in 0..self.config.repeats {
            cells.push(TestCell {
                mode: mode.to_string(),
                associations,
                tree_depth,
                repeat,
            });
        }
    }
}
