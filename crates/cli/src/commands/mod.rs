pub mod hash;
pub mod inspect;
pub mod listing;
pub mod matching;

pub use hash::*;
pub use inspect::*;
pub use listing::*;
pub use matching::*;
