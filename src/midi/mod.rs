mod file;
mod input;

pub use file::{
    DEFAULT_TEMPO, Division, ParseWarning, ParsedScore, ScoreHeader, parse, parse_file,
};
pub use input::connect_input;

#[cfg(test)]
pub(crate) use file::tests as fixtures;
