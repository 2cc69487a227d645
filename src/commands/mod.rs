pub mod bench;
pub mod update_gt;
