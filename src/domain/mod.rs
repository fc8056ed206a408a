pub mod entities;
pub mod feed;
pub mod value_objects;
