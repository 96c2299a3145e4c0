//! Core data types for the collaboration engine

pub mod address;
pub mod contact;
pub mod note;

pub use address::{Address, SenderId};
pub use contact::Contact;
pub use note::{NoteId, NoteSnapshot, NotebookId, NotebookRecord};
