pub mod constants;
pub mod convert;
pub mod library;
pub mod mixer;
pub mod track;

pub use convert::prepare_assets;
pub use library::{AmbientLibrary, LibraryStatus};
pub use mixer::{AmbientMixer, Levels};
pub use track::{AmbientTrack, TrackSummary};
