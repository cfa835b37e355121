pub mod background;
pub mod figure;
