use serde::{Deserialize, Serialize};

/// Minimal topology view the reporters need: per-atom residue labels and
/// masses plus the declared unit cell, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub atoms: Vec<TopologyAtom>,
    /// Unit cell dimensions declared by the topology in nm. `None` means the
    /// system is not periodic; trajectory sinks decide their cell handling
    /// from this once, at initialization.
    #[serde(default)]
    pub unit_cell_nm: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyAtom {
    pub name: String,
    #[serde(default)]
    pub element: String,
    pub resname: String,
    pub resid: i32,
    #[serde(default)]
    pub mass_amu: f32,
}

impl Topology {
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn total_mass_amu(&self) -> f64 {
        self.atoms.iter().map(|a| a.mass_amu as f64).sum()
    }
}

/// Indices of every atom whose residue name contains `resname` as a
/// substring. Substring, not equality: `"LIG"` also picks up `"LIG2"`.
pub fn atom_indices_from_top(resname: &str, topology: &Topology) -> Vec<usize> {
    let mut matched = Vec::new();
    for (index, atom) in topology.atoms.iter().enumerate() {
        if atom.resname.contains(resname) {
            matched.push(index);
        }
    }
    matched
}
