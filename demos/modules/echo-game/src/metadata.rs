use gdk_api::GameMetadata;

pub struct EchoInfo;

impl GameMetadata for EchoInfo {
    fn game_name(&self) -> String {
        "Echo".to_string()
    }

    fn game_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn game_description(&self) -> String {
        "Answers every message; counts turns until you send `end`".to_string()
    }

    fn game_author(&self) -> String {
        "GDK".to_string()
    }

    fn min_players(&self) -> u32 {
        1
    }

    fn max_players(&self) -> u32 {
        1
    }

    fn min_difficulty(&self) -> u32 {
        1
    }

    fn max_difficulty(&self) -> u32 {
        1
    }

    fn estimated_duration_minutes(&self) -> u32 {
        2
    }

    fn required_resources(&self) -> Vec<String> {
        Vec::new()
    }

    fn supports_online_multiplayer(&self) -> bool {
        false
    }

    fn supports_local_multiplayer(&self) -> bool {
        false
    }

    fn supports_single_player(&self) -> bool {
        true
    }
}
