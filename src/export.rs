//! Naming of debug dumps.
//!
//! Writing dumps is up to the caller; this module only decides *whether* a
//! state is dumped and under which path. The refinement counter is an
//! explicit value: each refinement iteration gets a new [`RefinementExport`]
//! from [`RefinementExport::next_refinement`], and nothing is shared or
//! mutated between iterations.

use std::path::PathBuf;

use crate::state::SmgState;

/// Which states are dumped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum ExportLevel {
    #[default]
    Never,
    /// Only states without successors (errors, program exit).
    Leaf,
    Every,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExportOptions {
    pub level: ExportLevel,
    /// Output path with `{refinement}` and `{state}` placeholders.
    pub path_template: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            level: ExportLevel::Never,
            path_template: "smg/refinement-{refinement}/smg-{state}.txt".to_string(),
        }
    }
}

impl ExportOptions {
    pub fn should_export(&self, leaf: bool) -> bool {
        match self.level {
            ExportLevel::Never => false,
            ExportLevel::Leaf => leaf,
            ExportLevel::Every => true,
        }
    }
}

/// Export options bound to one refinement iteration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RefinementExport {
    options: ExportOptions,
    refinement: u32,
}

impl RefinementExport {
    pub fn new(options: ExportOptions) -> Self {
        Self { options, refinement: 0 }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn refinement(&self) -> u32 {
        self.refinement
    }

    /// The same options for the following refinement iteration.
    pub fn next_refinement(&self) -> Self {
        Self {
            options: self.options.clone(),
            refinement: self.refinement + 1,
        }
    }

    /// Where to dump `state`, if it should be dumped at all.
    pub fn dump_path(&self, state: &SmgState, leaf: bool) -> Option<PathBuf> {
        if !self.options.should_export(leaf) {
            return None;
        }
        let path = self
            .options
            .path_template
            .replace("{refinement}", &self.refinement.to_string())
            .replace("{state}", &state.id().id().to_string());
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spc::SymbolicProgramConfiguration;

    #[test]
    fn test_levels() {
        let mut options = ExportOptions::default();
        assert!(!options.should_export(true));
        options.level = ExportLevel::Leaf;
        assert!(options.should_export(true));
        assert!(!options.should_export(false));
        options.level = ExportLevel::Every;
        assert!(options.should_export(false));
    }

    #[test]
    fn test_refinements_are_values() {
        let first = RefinementExport::new(ExportOptions {
            level: ExportLevel::Every,
            path_template: "out/{refinement}/{state}.smg".to_string(),
        });
        let second = first.next_refinement();
        assert_eq!(first.refinement(), 0);
        assert_eq!(second.refinement(), 1);

        let state = SmgState::new(SymbolicProgramConfiguration::new());
        let id = state.id().id();
        assert_eq!(
            second.dump_path(&state, false),
            Some(PathBuf::from(format!("out/1/{}.smg", id)))
        );
        assert_eq!(RefinementExport::new(ExportOptions::default()).dump_path(&state, true), None);
    }
}
