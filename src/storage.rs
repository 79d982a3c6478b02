pub mod bounding_box;
pub mod regular_grid;
pub mod tensor;
