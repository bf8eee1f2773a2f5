pub mod entry;
pub mod evidence;
pub mod files;
pub mod review;
