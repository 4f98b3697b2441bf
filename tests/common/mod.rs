pub mod builders;
pub mod mock_generator;
pub mod mock_target;
pub mod recording_store;
pub mod strategies;

pub use builders::*;
pub use mock_generator::*;
pub use mock_target::*;
pub use recording_store::*;
