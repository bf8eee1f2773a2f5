mod common;
mod evidence;
mod review;
