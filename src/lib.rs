mod codec;
mod engine;
mod error;
mod export;
mod importer;
mod model;
mod parser;
mod player;
mod transpose;

pub use codec::*;
pub use engine::*;
pub use error::*;
pub use export::*;
pub use importer::*;
pub use model::config::*;
pub use model::mapper::*;
pub use model::note::*;
pub use model::song::*;
pub use parser::*;
pub use player::*;
pub use transpose::*;
