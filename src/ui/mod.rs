pub mod board_view;
pub mod icons;

pub use board_view::{describe_change, render_board, render_board_directory, render_connection};
