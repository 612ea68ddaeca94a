pub mod codeforces;
pub mod note_service;
pub mod query;
pub mod reconcile;
pub mod resolver;

pub use note_service::NoteService;
