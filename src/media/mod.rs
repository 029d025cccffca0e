pub mod screenshot;
pub mod temp;
