pub mod google_docs;
pub mod google_drive;
