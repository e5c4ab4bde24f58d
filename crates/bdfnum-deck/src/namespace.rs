//! Identifier namespaces shared by all cards of a deck.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed ID-kind categories. Declaration order is the canonical
/// order used for block allocation and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Node,
    Element,
    Property,
    Material,
    Coord,
    SpcSet,
    MpcSet,
    LoadSet,
    Contact,
    OutputSet,
    Method,
    Table,
}

impl Namespace {
    pub const ALL: [Namespace; 12] = [
        Namespace::Node,
        Namespace::Element,
        Namespace::Property,
        Namespace::Material,
        Namespace::Coord,
        Namespace::SpcSet,
        Namespace::MpcSet,
        Namespace::LoadSet,
        Namespace::Contact,
        Namespace::OutputSet,
        Namespace::Method,
        Namespace::Table,
    ];

    /// Stable snake_case key used in snapshots and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Namespace::Node => "node",
            Namespace::Element => "element",
            Namespace::Property => "property",
            Namespace::Material => "material",
            Namespace::Coord => "coord",
            Namespace::SpcSet => "spc_set",
            Namespace::MpcSet => "mpc_set",
            Namespace::LoadSet => "load_set",
            Namespace::Contact => "contact",
            Namespace::OutputSet => "output_set",
            Namespace::Method => "method",
            Namespace::Table => "table",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Namespace::Node => "Node ID",
            Namespace::Element => "Element ID",
            Namespace::Property => "Property ID",
            Namespace::Material => "Material ID",
            Namespace::Coord => "Coord ID",
            Namespace::SpcSet => "SPC ID",
            Namespace::MpcSet => "MPC ID",
            Namespace::LoadSet => "Load ID",
            Namespace::Contact => "Contact ID",
            Namespace::OutputSet => "Set ID",
            Namespace::Method => "Method ID",
            Namespace::Table => "Table ID",
        }
    }

    /// Namespaces whose IDs name a set assembled from several cards
    /// (e.g. many FORCE cards forming load set 10).
    pub fn is_shared(self) -> bool {
        matches!(
            self,
            Namespace::SpcSet | Namespace::MpcSet | Namespace::LoadSet | Namespace::Contact
        )
    }

    /// Constraint, MPC and load set namespaces, optionally excluded from renumbering.
    pub fn is_set_id(self) -> bool {
        matches!(self, Namespace::SpcSet | Namespace::MpcSet | Namespace::LoadSet)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown namespace `{0}` (expected one of node, element, property, material, coord, spc_set, mpc_set, load_set, contact, output_set, method, table)")]
pub struct UnknownNamespace(pub String);

impl FromStr for Namespace {
    type Err = UnknownNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let alias = match wanted.as_str() {
            "nid" | "grid" => "node",
            "eid" => "element",
            "pid" => "property",
            "mid" => "material",
            "cid" => "coord",
            "spc" | "spc_id" => "spc_set",
            "mpc" | "mpc_id" => "mpc_set",
            "load" | "load_id" => "load_set",
            "contact_id" => "contact",
            "set" | "set_id" => "output_set",
            "method_id" => "method",
            "table_id" => "table",
            other => other,
        };
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.key() == alias)
            .ok_or_else(|| UnknownNamespace(s.to_string()))
    }
}
