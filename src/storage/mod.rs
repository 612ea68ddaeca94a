pub mod kv;
pub mod note;
