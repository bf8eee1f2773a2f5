pub mod evidence_file;
pub mod usage_entry;
