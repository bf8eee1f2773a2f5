pub mod entry;
pub mod evidence;
pub mod review;
