pub mod review;
pub mod submit;
