//! A minimal GDK game: replies to each message and keeps a turn count.
//!
//! Messages:
//! - `{"function": "echo", ...}` returns the message with the turn number
//! - `{"function": "status"}` returns the turn count
//! - `{"function": "end"}` finishes the game

mod metadata;

use gdk_api::{
    GameMetadata, GameModule, GameSurface, Message, ModuleError, Scene, message_function,
};
use serde_json::{Value, json};

use metadata::EchoInfo;

pub struct EchoGame {
    info: EchoInfo,
    turns: u64,
    greeting: String,
    running: bool,
}

impl EchoGame {
    pub fn new() -> Self {
        Self {
            info: EchoInfo,
            turns: 0,
            greeting: "Hello!".to_string(),
            running: false,
        }
    }

    fn reply(&self, value: Value) -> Message {
        match value {
            Value::Object(map) => map,
            _ => Message::new(),
        }
    }
}

impl Default for EchoGame {
    fn default() -> Self {
        Self::new()
    }
}

impl GameModule for EchoGame {
    fn game_id(&self) -> String {
        "echo".to_string()
    }

    fn metadata(&self) -> &dyn GameMetadata {
        &self.info
    }

    fn launch(
        &mut self,
        surface: &mut dyn GameSurface,
        config: Option<&Message>,
    ) -> Result<Scene, ModuleError> {
        if let Some(greeting) = config.and_then(|c| c.get("greeting")) {
            self.greeting = greeting
                .as_str()
                .ok_or("`greeting` must be a string")?
                .to_string();
        }
        self.turns = 0;
        self.running = true;

        surface.set_title("Echo");
        surface.show(&self.greeting);
        Ok(Scene::new("Echo").with_body(self.greeting.clone()))
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn handle_message(&mut self, message: &Message) -> Message {
        if !self.running {
            return self.reply(json!({"function": "error", "reason": "not running"}));
        }
        self.turns += 1;

        match message_function(message) {
            Some("status") => self.reply(json!({"function": "status", "turns": self.turns})),
            Some("end") => {
                self.running = false;
                self.reply(json!({"function": "end", "turns": self.turns}))
            }
            Some(_) => {
                let mut reply = message.clone();
                reply.insert("turn".to_string(), json!(self.turns));
                reply
            }
            None => self.reply(json!({"function": "error", "reason": "missing `function`"})),
        }
    }
}

gdk_api::export_game_module!(EchoGame::new);
