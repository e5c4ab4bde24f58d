//! Nastran bulk data deck model for bdfnum
//!
//! This crate is the model repository the renumbering engine consumes:
//! - `lex`: section splitting, `INCLUDE` recognition, card/continuation grouping
//!   for small-field, large-field and free-field input
//! - `kind` / `namespace`: the closed set of typed card kinds and the ID
//!   namespaces their primary IDs live in
//! - `card`: a record with flattened fields and lossless re-rendering
//! - `deck`: reading a main file plus includes into per-kind dictionaries, with
//!   a passthrough bucket for unknown or disabled card names
//!
//! The reader flattens includes; it does not record which file a card came
//! from. File provenance is the include discoverer's job.

use std::path::PathBuf;
use thiserror::Error;

pub mod card;
pub mod deck;
pub mod kind;
pub mod lex;
pub mod namespace;

pub use card::Card;
pub use deck::{read_deck, CardTable, Deck, ReadOptions};
pub use kind::CardKind;
pub use namespace::{Namespace, UnknownNamespace};

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
