//! Dependency-ordered script assembly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RebuildError, RebuildResult};

use super::block::TableRebuildBlock;

/// Position of a table in the referential hierarchy. Lower ranks load first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    /// Reference/dimension table (materials, energy sources, label and range categories).
    Lookup,
    /// The primary entity table.
    Primary,
    /// One-to-many or junction table referencing the primary table.
    #[default]
    Dependent,
}

impl TableRole {
    pub fn rank(self) -> u8 {
        match self {
            TableRole::Lookup => 0,
            TableRole::Primary => 1,
            TableRole::Dependent => 2,
        }
    }
}

/// Static dependency graph between target tables.
///
/// `depends_on` edges point from a referencing table to the tables it references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct GraphNode {
    role: TableRole,
    #[serde(default)]
    depends_on: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table (or update its role).
    pub fn add_table(&mut self, table: &str, role: TableRole) {
        self.nodes.entry(table.to_string()).or_default().role = role;
    }

    /// Record that `table` references `referenced`.
    pub fn add_dependency(&mut self, table: &str, referenced: &str) {
        let node = self.nodes.entry(table.to_string()).or_default();
        if !node.depends_on.iter().any(|d| d == referenced) {
            node.depends_on.push(referenced.to_string());
        }
    }

    /// Merge another graph's edges into this one. Roles already declared here are kept.
    pub fn merge(&mut self, other: &DependencyGraph) {
        for (table, node) in &other.nodes {
            if !self.contains(table) {
                self.add_table(table, node.role);
            }
            for dep in &node.depends_on {
                self.add_dependency(table, dep);
            }
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.nodes.contains_key(table)
    }

    pub fn role(&self, table: &str) -> Option<TableRole> {
        self.nodes.get(table).map(|n| n.role)
    }

    pub fn dependencies(&self, table: &str) -> &[String] {
        self.nodes
            .get(table)
            .map(|n| n.depends_on.as_slice())
            .unwrap_or_default()
    }
}

/// Orders rebuild blocks and concatenates them into the final script.
#[derive(Debug, Clone)]
pub struct ScriptAssembler {
    graph: DependencyGraph,
}

impl ScriptAssembler {
    pub fn new(graph: DependencyGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Topologically order `blocks`.
    ///
    /// Among tables whose dependencies are satisfied, the lowest role rank goes first and ties
    /// keep input order. Edges to tables without a block in this run are ignored.
    pub fn order(&self, blocks: Vec<TableRebuildBlock>) -> RebuildResult<Vec<TableRebuildBlock>> {
        let mut position: BTreeMap<&str, usize> = BTreeMap::new();
        for (idx, block) in blocks.iter().enumerate() {
            if !self.graph.contains(block.table()) {
                return Err(RebuildError::UnknownTable {
                    table: block.table().to_string(),
                });
            }
            if position.insert(block.table(), idx).is_some() {
                return Err(RebuildError::InvalidMapping {
                    table: block.table().to_string(),
                    message: "more than one block for table".to_string(),
                });
            }
        }

        let deps: Vec<Vec<usize>> = blocks
            .iter()
            .map(|b| {
                self.graph
                    .dependencies(b.table())
                    .iter()
                    .filter_map(|d| position.get(d.as_str()).copied())
                    .collect()
            })
            .collect();

        let mut placed = vec![false; blocks.len()];
        let mut sequence: Vec<usize> = Vec::with_capacity(blocks.len());
        while sequence.len() < blocks.len() {
            let next = (0..blocks.len())
                .filter(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]))
                .min_by_key(|&i| (self.rank_of(&blocks[i]), i));

            match next {
                Some(i) => {
                    placed[i] = true;
                    sequence.push(i);
                }
                None => {
                    let tables = (0..blocks.len())
                        .filter(|&i| !placed[i])
                        .map(|i| blocks[i].table().to_string())
                        .collect();
                    return Err(RebuildError::DependencyCycle { tables });
                }
            }
        }

        let mut slots: Vec<Option<TableRebuildBlock>> = blocks.into_iter().map(Some).collect();
        Ok(sequence
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect())
    }

    /// Order and concatenate `blocks` into the script text.
    pub fn assemble(&self, blocks: Vec<TableRebuildBlock>) -> RebuildResult<String> {
        let ordered = self.order(blocks)?;
        Ok(ordered.iter().map(TableRebuildBlock::render).collect())
    }

    fn rank_of(&self, block: &TableRebuildBlock) -> u8 {
        self.graph
            .role(block.table())
            .unwrap_or_default()
            .rank()
    }
}
