pub mod builder;
pub mod options;
pub mod output_box;

pub use builder::{build, BuildOutput};
pub use options::BuildOptions;
pub use output_box::OutputBox;
