pub mod formatter;

pub use formatter::{
    format_players, print_compilation_failures, print_displayed_message, print_game_list,
    print_outcomes,
};
