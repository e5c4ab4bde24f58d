//! The closed set of card types the deck reader parses into typed records.
//!
//! Anything else is kept verbatim in the deck's passthrough bucket.

use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::fmt;

use Namespace::*;

macro_rules! card_kinds {
    ($($variant:ident => $name:literal, $ns:expr;)*) => {
        /// A recognized bulk data card type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum CardKind {
            $($variant,)*
        }

        impl CardKind {
            pub const ALL: &'static [CardKind] = &[$(CardKind::$variant,)*];

            /// Upper-case card name as written in field 1.
            pub fn name(self) -> &'static str {
                match self {
                    $(CardKind::$variant => $name,)*
                }
            }

            /// Namespace of the card's primary ID, if it has one.
            pub fn namespace(self) -> Option<Namespace> {
                match self {
                    $(CardKind::$variant => $ns,)*
                }
            }

            /// Look up a card name (already upper-cased, no trailing `*`).
            pub fn from_name(name: &str) -> Option<CardKind> {
                match name {
                    $($name => Some(CardKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

card_kinds! {
    // Nodes
    Grid => "GRID", Some(Node);
    Spoint => "SPOINT", Some(Node);
    // Elements
    Cquad4 => "CQUAD4", Some(Element);
    Ctria3 => "CTRIA3", Some(Element);
    Cquad8 => "CQUAD8", Some(Element);
    Ctria6 => "CTRIA6", Some(Element);
    Cquadr => "CQUADR", Some(Element);
    Ctriar => "CTRIAR", Some(Element);
    Cshear => "CSHEAR", Some(Element);
    Chexa => "CHEXA", Some(Element);
    Cpenta => "CPENTA", Some(Element);
    Ctetra => "CTETRA", Some(Element);
    Cbar => "CBAR", Some(Element);
    Cbeam => "CBEAM", Some(Element);
    Crod => "CROD", Some(Element);
    Conrod => "CONROD", Some(Element);
    Cbush => "CBUSH", Some(Element);
    Celas1 => "CELAS1", Some(Element);
    Celas2 => "CELAS2", Some(Element);
    Celas3 => "CELAS3", Some(Element);
    Celas4 => "CELAS4", Some(Element);
    Cdamp1 => "CDAMP1", Some(Element);
    Cdamp2 => "CDAMP2", Some(Element);
    Cdamp3 => "CDAMP3", Some(Element);
    Cdamp4 => "CDAMP4", Some(Element);
    Cgap => "CGAP", Some(Element);
    Cweld => "CWELD", Some(Element);
    Cfast => "CFAST", Some(Element);
    Cvisc => "CVISC", Some(Element);
    Plotel => "PLOTEL", Some(Element);
    Chbdyg => "CHBDYG", Some(Element);
    Chbdye => "CHBDYE", Some(Element);
    Rbe2 => "RBE2", Some(Element);
    Rbe3 => "RBE3", Some(Element);
    Rbar => "RBAR", Some(Element);
    Conm1 => "CONM1", Some(Element);
    Conm2 => "CONM2", Some(Element);
    Cmass1 => "CMASS1", Some(Element);
    Cmass2 => "CMASS2", Some(Element);
    Cmass3 => "CMASS3", Some(Element);
    Cmass4 => "CMASS4", Some(Element);
    // Properties
    Pshell => "PSHELL", Some(Property);
    Pcomp => "PCOMP", Some(Property);
    Pcompg => "PCOMPG", Some(Property);
    Pcompls => "PCOMPLS", Some(Property);
    Psolid => "PSOLID", Some(Property);
    Plsolid => "PLSOLID", Some(Property);
    Pbar => "PBAR", Some(Property);
    Pbarl => "PBARL", Some(Property);
    Pbeam => "PBEAM", Some(Property);
    Pbeaml => "PBEAML", Some(Property);
    Prod => "PROD", Some(Property);
    Pbush => "PBUSH", Some(Property);
    Pbusht => "PBUSHT", Some(Property);
    Pelas => "PELAS", Some(Property);
    Pdamp => "PDAMP", Some(Property);
    Pgap => "PGAP", Some(Property);
    Pshear => "PSHEAR", Some(Property);
    Pweld => "PWELD", Some(Property);
    Pfast => "PFAST", Some(Property);
    Pvisc => "PVISC", Some(Property);
    // Materials
    Mat1 => "MAT1", Some(Material);
    Mat2 => "MAT2", Some(Material);
    Mat8 => "MAT8", Some(Material);
    Mat9 => "MAT9", Some(Material);
    Mat10 => "MAT10", Some(Material);
    // Coordinate systems
    Cord2r => "CORD2R", Some(Coord);
    Cord2c => "CORD2C", Some(Coord);
    Cord2s => "CORD2S", Some(Coord);
    Cord1r => "CORD1R", Some(Coord);
    Cord1c => "CORD1C", Some(Coord);
    Cord1s => "CORD1S", Some(Coord);
    // Single-point constraints
    Spc => "SPC", Some(SpcSet);
    Spc1 => "SPC1", Some(SpcSet);
    Spcadd => "SPCADD", Some(SpcSet);
    // Multi-point constraints
    Mpc => "MPC", Some(MpcSet);
    Mpcadd => "MPCADD", Some(MpcSet);
    // Static loads
    Force => "FORCE", Some(LoadSet);
    Moment => "MOMENT", Some(LoadSet);
    Pload => "PLOAD", Some(LoadSet);
    Pload2 => "PLOAD2", Some(LoadSet);
    Pload4 => "PLOAD4", Some(LoadSet);
    Grav => "GRAV", Some(LoadSet);
    Rforce => "RFORCE", Some(LoadSet);
    Temp => "TEMP", Some(LoadSet);
    Tempd => "TEMPD", Some(LoadSet);
    Darea => "DAREA", Some(LoadSet);
    Load => "LOAD", Some(LoadSet);
    // Dynamic loads
    Dload => "DLOAD", Some(LoadSet);
    Rload1 => "RLOAD1", Some(LoadSet);
    Rload2 => "RLOAD2", Some(LoadSet);
    Tload1 => "TLOAD1", Some(LoadSet);
    Tload2 => "TLOAD2", Some(LoadSet);
    // Contact
    Bsurf => "BSURF", Some(Contact);
    Bsurfs => "BSURFS", Some(Contact);
    Bctset => "BCTSET", Some(Contact);
    Bctadd => "BCTADD", Some(Contact);
    Bconp => "BCONP", Some(Contact);
    Bcbody => "BCBODY", Some(Contact);
    Bctpara => "BCTPARA", Some(Contact);
    Bctparm => "BCTPARM", Some(Contact);
    Blseg => "BLSEG", Some(Contact);
    Bfric => "BFRIC", Some(Contact);
    // Output sets
    Set1 => "SET1", Some(OutputSet);
    Set3 => "SET3", Some(OutputSet);
    // Eigenvalue methods
    Eigrl => "EIGRL", Some(Method);
    Eigr => "EIGR", Some(Method);
    // Tables
    Tabled1 => "TABLED1", Some(Table);
    Tablem1 => "TABLEM1", Some(Table);
    Tabdmp1 => "TABDMP1", Some(Table);
    // Supports (no ID of their own)
    Suport => "SUPORT", None;
    Suport1 => "SUPORT1", None;
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for kind in CardKind::ALL {
            assert_eq!(CardKind::from_name(kind.name()), Some(*kind));
        }
        assert_eq!(CardKind::from_name("BCPROPS"), None);
    }

    #[test]
    fn supports_have_no_primary_namespace() {
        assert_eq!(CardKind::Suport.namespace(), None);
        assert_eq!(CardKind::Grid.namespace(), Some(Namespace::Node));
        assert_eq!(CardKind::Rbe3.namespace(), Some(Namespace::Element));
    }
}
