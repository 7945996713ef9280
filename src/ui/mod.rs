pub mod icons;
pub mod render;

pub use render::LoadingSpinner;
