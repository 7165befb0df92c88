use std::fmt;

use colored::Colorize;

use crate::dir_path::DirPath;
use crate::metadata::{DirectoryAggregate, MetadataTree};

/// Root aggregate printed at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    applied: usize,
    root: DirectoryAggregate,
}

impl Summary {
    pub fn from_tree(tree: &MetadataTree, applied: usize) -> Option<Self> {
        tree.aggregate(&DirPath::root())
            .map(|root| Self { applied, root })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let health = if self.root.health > 1.0 {
            format!("{:.2}", self.root.health).red()
        } else {
            format!("{:.2}", self.root.health).green()
        };
        let redundancy = self
            .root
            .min_redundancy
            .map(|r| format!("{r:.2}"))
            .unwrap_or_else(|| "-".to_string());

        writeln!(f, "{} mutations applied", self.applied.to_string().bold())?;
        writeln!(f, "{:>16} {}", "size".cyan(), self.root.size)?;
        writeln!(f, "{:>16} {}", "files".cyan(), self.root.num_files)?;
        writeln!(f, "{:>16} {}", "directories".cyan(), self.root.num_subdirs)?;
        writeln!(f, "{:>16} {}", "worst health".cyan(), health)?;
        write!(f, "{:>16} {}", "min redundancy".cyan(), redundancy)
    }
}
