pub mod slider;
pub mod transcript_list;
